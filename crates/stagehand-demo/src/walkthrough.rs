#![forbid(unsafe_code)]

//! The abuse detection/prevention walkthrough shipped with the product.
//!
//! Anchor names match the element ids of the onboarding page. The layout
//! is a fixed desktop arrangement: a 256 px sidebar, the scrollable main
//! column to its right, and the accounts table below the status header.

use std::time::Duration;

use stagehand_core::anchor::{AnchorId, AnchorRegistry};
use stagehand_core::geometry::{Point, Rect};
use stagehand_runtime::Walkthrough;
use stagehand_runtime::reveal::Feature;
use stagehand_runtime::sequencer::Sequence;
use stagehand_runtime::typing::{LoginAttempt, Outcome};

pub const CONTAINER: AnchorId = AnchorId::from_static("main-content");
pub const ABUSE_STATUS_HEADER: AnchorId = AnchorId::from_static("abuse-status-header");
pub const FLAGGED_ACCOUNT_1: AnchorId = AnchorId::from_static("flagged-account-1");
pub const FLAGGED_ACCOUNT_2: AnchorId = AnchorId::from_static("flagged-account-2");

pub const VALID_EMAIL: &str = "alex@acme-corp.com";
pub const INVALID_EMAIL: &str = "scammer@burner.xyz";

/// Abuse verdict of a row in the accounts table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbuseStatus {
    Clean,
    Flagged,
}

/// One row of the accounts table the pointer walks over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: u32,
    pub name: &'static str,
    pub status: AbuseStatus,
    pub reason: Option<&'static str>,
}

pub const ACCOUNTS: [Account; 3] = [
    Account {
        id: 1,
        name: "Acme Inc.",
        status: AbuseStatus::Clean,
        reason: None,
    },
    Account {
        id: 2,
        name: "fxzig.com",
        status: AbuseStatus::Flagged,
        reason: Some("Disposable Domain"),
    },
    Account {
        id: 4,
        name: "forexzig.com",
        status: AbuseStatus::Flagged,
        reason: None,
    },
];

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Header, then both flagged rows.
pub fn detection_sequence() -> Sequence {
    Sequence::new()
        .step(ABUSE_STATUS_HEADER, ms(2000), "Check abuse status!")
        .step(FLAGGED_ACCOUNT_1, ms(1500), "Flagged account")
        .step(FLAGGED_ACCOUNT_2, ms(1500), "Another flagged account")
}

pub fn login_attempts() -> Vec<LoginAttempt> {
    vec![
        LoginAttempt::new(VALID_EMAIL, Outcome::Success),
        LoginAttempt::new(INVALID_EMAIL, Outcome::Failure),
    ]
}

pub fn unlockable_features() -> Vec<Feature> {
    vec![
        Feature::new(
            "account-list",
            "Accounts List",
            "View and manage all your accounts with abuse detection status",
            "users",
        ),
        Feature::new(
            "user-list",
            "User List",
            "Access detailed user information and abuse prevention insights",
            "users",
        ),
    ]
}

/// The full session. The product hides the detected-events list, so no
/// events are passed.
pub fn abuse_walkthrough(session_completed: bool) -> Walkthrough {
    Walkthrough {
        container: CONTAINER,
        sequence: detection_sequence(),
        attempts: login_attempts(),
        features: unlockable_features(),
        events: Vec::new(),
        session_completed,
    }
}

const ROW_HEIGHT: f64 = 48.0;
const TABLE_TOP: f64 = 464.0;

/// Desktop layout: header above the table, one row per account.
pub fn demo_layout() -> AnchorRegistry {
    let mut layout = AnchorRegistry::new(CONTAINER, Point::new(256.0, 64.0));
    layout.mount(ABUSE_STATUS_HEADER, Rect::new(612.0, 420.0, 140.0, 40.0));
    let flagged = [FLAGGED_ACCOUNT_1, FLAGGED_ACCOUNT_2];
    let rows = ACCOUNTS
        .iter()
        .enumerate()
        .filter(|(_, a)| a.status == AbuseStatus::Flagged);
    for (anchor, (row, _)) in flagged.into_iter().zip(rows) {
        let top = TABLE_TOP + ROW_HEIGHT * row as f64;
        layout.mount(anchor, Rect::new(612.0, top, 140.0, ROW_HEIGHT));
    }
    layout
}
