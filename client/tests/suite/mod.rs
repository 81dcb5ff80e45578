mod connect;
mod event_stream;
mod issues;
mod paging;
