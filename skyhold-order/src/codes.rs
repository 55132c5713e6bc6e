use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashSet;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const PNR_PREFIX: &str = "SKY";

fn random_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// `ORD-YYYYMMDD-XXXX`
pub fn order_id(now: DateTime<Utc>) -> String {
    format!("ORD-{}-{}", now.format("%Y%m%d"), random_string(4))
}

/// Passenger-facing reservation reference
pub fn booking_code() -> String {
    format!("{}{}", PNR_PREFIX, random_string(5))
}

/// `count` ticket numbers of the form `{pnr}-XXX`, distinct from each other.
/// Uniqueness against stored tickets is enforced by the store.
pub fn ticket_numbers(pnr: &str, count: usize) -> Vec<String> {
    let mut seen = HashSet::with_capacity(count);
    let mut tickets = Vec::with_capacity(count);
    while tickets.len() < count {
        let ticket = format!("{}-{}", pnr, random_string(3));
        if seen.insert(ticket.clone()) {
            tickets.push(ticket);
        }
    }
    tickets
}
