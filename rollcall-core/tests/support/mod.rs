//! In-memory implementations of the store, queue, and transport ports for
//! end-to-end pipeline tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};

use rollcall_core::database::ports::memberships::MembershipsRepository;
use rollcall_core::error::{RenewalError, Result};
use rollcall_core::queue::{Delivery, JobQueue};
use rollcall_core::transport::{EmailTransport, OutboundEmail};
use rollcall_model::{Cycle, MemberId, Membership, RenewalCandidate, RenewalState};

/// Store fake mirroring the predicate semantics of the Postgres
/// repository, one membership row per family plus primary-member names.
#[derive(Default)]
pub struct InMemoryStore {
    rows: Mutex<Vec<Membership>>,
    names: Mutex<HashMap<MemberId, (String, String)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, membership: Membership) {
        self.rows.lock().unwrap().push(membership);
    }

    pub fn insert_named(&self, membership: Membership, name: &str, last_name: &str) {
        self.names.lock().unwrap().insert(
            membership.member_id,
            (name.to_string(), last_name.to_string()),
        );
        self.insert(membership);
    }

    pub fn snapshot(&self, member_id: MemberId) -> Option<Membership> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.member_id == member_id)
            .cloned()
    }

    fn in_cycle(expires: Option<NaiveDate>, cycle: Cycle) -> bool {
        expires.is_some_and(|d| d.month() == cycle.month && d.year() == cycle.year)
    }
}

#[async_trait]
impl MembershipsRepository for InMemoryStore {
    async fn get(&self, member_id: MemberId) -> Result<Option<Membership>> {
        Ok(self.snapshot(member_id))
    }

    async fn renewal_state(&self, member_id: MemberId) -> Result<Option<RenewalState>> {
        Ok(self.snapshot(member_id).map(|m| RenewalState {
            membership_expires: m.membership_expires,
            renewal_email_sent: m.renewal_email_sent,
        }))
    }

    async fn sweep_expired(&self, as_of: NaiveDate) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for row in rows.iter_mut() {
            if !row.founding_family
                && row.active
                && row.membership_expires.is_some_and(|d| d < as_of)
            {
                row.active = false;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn reset_renewal_flags(&self, cycle: Cycle) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for row in rows.iter_mut() {
            if Self::in_cycle(row.membership_expires, cycle) {
                row.renewal_email_sent = false;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn find_renewal_candidates(&self, cycle: Cycle) -> Result<Vec<RenewalCandidate>> {
        let rows = self.rows.lock().unwrap();
        let names = self.names.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|m| {
                !m.founding_family
                    && m.active
                    && !m.renewal_email_sent
                    && Self::in_cycle(m.membership_expires, cycle)
            })
            .map(|m| {
                let (name, last_name) = names
                    .get(&m.member_id)
                    .map(|(n, l)| (Some(n.clone()), Some(l.clone())))
                    .unwrap_or((None, None));
                RenewalCandidate {
                    member_id: m.member_id,
                    email: m.email.clone(),
                    name,
                    last_name,
                    expires: m.membership_expires.expect("candidate without expiry"),
                }
            })
            .collect())
    }

    async fn mark_renewal_notified(&self, member_id: MemberId, expires: NaiveDate) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        for row in rows.iter_mut() {
            if row.member_id == member_id && row.membership_expires == Some(expires) {
                row.renewal_email_sent = true;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn suppress_address(&self, email: &str) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for row in rows.iter_mut() {
            if row.email.as_deref() == Some(email) {
                row.email = None;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn renew_membership(&self, member_id: MemberId, new_expiry: NaiveDate) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        for row in rows.iter_mut() {
            if row.member_id == member_id {
                row.membership_expires = Some(new_expiry);
                row.active = true;
                row.renewal_email_sent = false;
                return Ok(());
            }
        }
        Err(RenewalError::NotFound(format!(
            "membership {member_id} not found"
        )))
    }

    async fn recompute_expirations(&self) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for row in rows.iter_mut() {
            let Some(start) = row.mem_start_date else {
                continue;
            };
            if row.founding_family {
                continue;
            }
            let new_expiry = end_of_month(start.with_year(start.year() + 1).unwrap());
            if row.membership_expires != Some(new_expiry) {
                row.renewal_email_sent = false;
            }
            row.membership_expires = Some(new_expiry);
            affected += 1;
        }
        Ok(affected)
    }
}

fn end_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap() - chrono::Days::new(1)
}

/// FIFO queue fake with the same ready/pending/dead settlement model as
/// the Redis queue.
#[derive(Default)]
pub struct InMemoryQueue {
    ready: Mutex<VecDeque<String>>,
    pending: Mutex<Vec<String>>,
    dead: Mutex<Vec<String>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready_len(&self) -> usize {
        self.ready.lock().unwrap().len()
    }

    pub fn dead_len(&self) -> usize {
        self.dead.lock().unwrap().len()
    }

    pub fn ready_bodies(&self) -> Vec<String> {
        self.ready.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn enqueue(&self, body: String) -> Result<()> {
        self.ready.lock().unwrap().push_back(body);
        Ok(())
    }

    async fn receive(&self, max: usize) -> Result<Vec<Delivery>> {
        let mut ready = self.ready.lock().unwrap();
        let mut pending = self.pending.lock().unwrap();
        let mut batch = Vec::new();
        while batch.len() < max {
            match ready.pop_front() {
                Some(body) => {
                    pending.push(body.clone());
                    batch.push(Delivery { body });
                }
                None => break,
            }
        }
        Ok(batch)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        let mut pending = self.pending.lock().unwrap();
        if let Some(pos) = pending.iter().position(|b| *b == delivery.body) {
            pending.remove(pos);
        }
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> Result<()> {
        self.ready.lock().unwrap().push_back(delivery.body.clone());
        let mut pending = self.pending.lock().unwrap();
        if let Some(pos) = pending.iter().position(|b| *b == delivery.body) {
            pending.remove(pos);
        }
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, _reason: &str) -> Result<()> {
        self.dead.lock().unwrap().push(delivery.body.clone());
        let mut pending = self.pending.lock().unwrap();
        if let Some(pos) = pending.iter().position(|b| *b == delivery.body) {
            pending.remove(pos);
        }
        Ok(())
    }

    async fn recover_stalled(&self) -> Result<u64> {
        let mut ready = self.ready.lock().unwrap();
        let mut pending = self.pending.lock().unwrap();
        let recovered = pending.len() as u64;
        for body in pending.drain(..) {
            ready.push_back(body);
        }
        Ok(recovered)
    }
}

/// Transport fake that records every accepted send and can be primed to
/// fail a number of attempts first.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutboundEmail>>,
    failures_remaining: AtomicU32,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(attempts: u32) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failures_remaining: AtomicU32::new(attempts),
        }
    }

    pub fn recover(&self) {
        self.failures_remaining.store(0, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(RenewalError::Transport("simulated outage".to_string()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}
