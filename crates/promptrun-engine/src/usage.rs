//! Usage aggregation

use promptrun_core::normalized::{NormalizedResponse, Usage};

/// Sum usage over every response of a turn, intermediate tool round-trips included
pub fn aggregate(responses: &[NormalizedResponse]) -> Usage {
    responses.iter().map(|r| &r.usage).sum()
}
