//! In-memory feature stores.
//!
//! Each store is mutated by the background loop that owns its feed and read
//! from any thread, so state lives behind an `RwLock`. A poisoned lock is
//! recovered rather than propagated.

mod dependency_risks;
mod issues;
mod quality_profiles;
mod taint;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use dependency_risks::DependencyRiskStore;
pub use issues::IssueStore;
pub use quality_profiles::QualityProfileStore;
pub use taint::{TaintIssue, TaintStore, TextRange};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
