#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tally_common::{
    DailyCompletion, Identity, NewDailyCompletion, NewRating, Rating, UserProfile,
};
use tally_sync::{Probe, Remote, Result, SyncError};

/// In-memory persistence boundary with scriptable write failures
#[derive(Default)]
pub struct FakeRemote {
    pub ratings: Mutex<Vec<Rating>>,
    pub completions: Mutex<Vec<DailyCompletion>>,
    pub profiles: Mutex<HashMap<String, UserProfile>>,
    /// 1-based write attempt numbers that fail
    failing_writes: Mutex<HashSet<usize>>,
    /// Customer references whose rating writes fail
    failing_customers: Mutex<HashSet<String>>,
    fail_everything: AtomicBool,
    write_attempts: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_write(&self, attempt: usize) {
        self.failing_writes.lock().unwrap().insert(attempt);
    }

    pub fn fail_customer(&self, customer: &str) {
        self.failing_customers
            .lock()
            .unwrap()
            .insert(customer.to_string());
    }

    pub fn heal(&self) {
        self.failing_writes.lock().unwrap().clear();
        self.failing_customers.lock().unwrap().clear();
        self.fail_everything.store(false, Ordering::SeqCst);
    }

    pub fn fail_everything(&self) {
        self.fail_everything.store(true, Ordering::SeqCst);
    }

    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    pub fn customers(&self) -> Vec<String> {
        self.ratings
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.customer_number.clone())
            .collect()
    }

    fn unavailable() -> SyncError {
        SyncError::Server {
            status: 503,
            body: "unavailable".to_string(),
        }
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_everything.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        let attempt = self.write_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_everything.load(Ordering::SeqCst)
            || self.failing_writes.lock().unwrap().contains(&attempt)
        {
            return Err(Self::unavailable());
        }
        Ok(())
    }

    fn next_rating_id(&self) -> i64 {
        self.ratings.lock().unwrap().len() as i64 + 1
    }
}

#[async_trait]
impl Remote for FakeRemote {
    async fn list_ratings(&self, email: Option<&str>) -> Result<Vec<Rating>> {
        self.check_read()?;
        let ratings = self.ratings.lock().unwrap();
        Ok(ratings
            .iter()
            .filter(|r| email.map_or(true, |e| r.email == e))
            .cloned()
            .collect())
    }

    async fn create_rating(&self, rating: &NewRating) -> Result<Rating> {
        self.check_write()?;
        if self
            .failing_customers
            .lock()
            .unwrap()
            .contains(&rating.customer_number)
        {
            return Err(Self::unavailable());
        }

        // Yield so concurrent drains get a chance to interleave
        tokio::task::yield_now().await;

        let saved = Rating {
            id: self.next_rating_id(),
            name: rating.name.clone(),
            email: rating.email.clone(),
            customer_number: rating.customer_number.clone(),
            score: rating.score,
            created_at: Utc::now(),
        };
        self.ratings.lock().unwrap().push(saved.clone());
        Ok(saved)
    }

    async fn update_rating(&self, id: i64, rating: &NewRating) -> Result<Rating> {
        self.check_write()?;
        let mut ratings = self.ratings.lock().unwrap();
        let existing = ratings
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(SyncError::Server {
                status: 404,
                body: "no such rating".to_string(),
            })?;
        existing.customer_number = rating.customer_number.clone();
        existing.score = rating.score;
        Ok(existing.clone())
    }

    async fn delete_rating(&self, id: i64) -> Result<()> {
        self.check_write()?;
        self.ratings.lock().unwrap().retain(|r| r.id != id);
        Ok(())
    }

    async fn list_completions(&self) -> Result<Vec<DailyCompletion>> {
        self.check_read()?;
        Ok(self.completions.lock().unwrap().clone())
    }

    async fn create_completion(&self, record: &NewDailyCompletion) -> Result<DailyCompletion> {
        self.check_write()?;
        let mut completions = self.completions.lock().unwrap();
        let saved = DailyCompletion {
            id: Some(completions.len() as i64 + 1),
            name: record.name.clone(),
            email: record.email.clone(),
            completed: record.completed,
            created_at: record.created_at,
        };
        completions.push(saved.clone());
        Ok(saved)
    }

    async fn get_profile(&self, email: &str) -> Result<Option<UserProfile>> {
        self.check_read()?;
        Ok(self.profiles.lock().unwrap().get(email).cloned())
    }

    async fn save_profile(&self, email: &str, name: &str) -> Result<UserProfile> {
        self.check_write()?;
        let mut profiles = self.profiles.lock().unwrap();
        let next_id = profiles.len() as i64 + 1;
        let profile = profiles
            .entry(email.to_string())
            .or_insert_with(|| UserProfile {
                id: Some(next_id),
                email: email.to_string(),
                name: None,
            });
        profile.name = Some(name.to_string());
        Ok(profile.clone())
    }
}

/// Probe whose answer is flipped by the test
#[derive(Default)]
pub struct ScriptedProbe {
    reachable: AtomicBool,
    checks: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(reachable: bool) -> Arc<Self> {
        let probe = Self::default();
        probe.reachable.store(reachable, Ordering::SeqCst);
        Arc::new(probe)
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn check(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.reachable.load(Ordering::SeqCst)
    }
}

pub fn ann() -> Identity {
    Identity::new("Ann Lee", "ann@x.com")
}
