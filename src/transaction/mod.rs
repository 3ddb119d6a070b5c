// Author: Jacques Murray

//! Platform transactions: "submit now, converge later".
//!
//! An operation such as creating a tenant or onboarding a device is
//! submitted once and answered with a [`Transaction`]. The transaction is a
//! read-only mirror of remote progress; its `transactionPollingUrl` is read
//! until the status is `DONE` or `ERROR`. See [`TransactionPoller`].

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::vocabulary;

mod poller;

pub use poller::{TransactionError, TransactionPoller, TransactionTransport};

vocabulary! {
    TransactionStatus {
        Pending => "PENDING",
        InProgress => "IN_PROGRESS",
        Done => "DONE",
        Error => "ERROR",
    }
    else Unknown
}

/// A transaction as returned by the trigger call and by its polling URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "transactionUid")]
    pub uid: String,
    #[serde(default)]
    pub tenant_uid: Option<String>,
    #[serde(default)]
    pub entity_uid: String,
    #[serde(default)]
    pub entity_url: Option<String>,
    /// Empty when the platform did not hand one back.
    #[serde(rename = "transactionPollingUrl", default)]
    pub polling_url: String,
    #[serde(default)]
    pub submission_time: Option<String>,
    #[serde(default)]
    pub last_updated_time: Option<String>,
    #[serde(default)]
    pub transaction_type: Option<String>,
    #[serde(rename = "cdoTransactionStatus")]
    pub status: TransactionStatus,
    #[serde(rename = "transactionDetails", default)]
    pub details: BTreeMap<String, String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_details: BTreeMap<String, String>,
}

impl Transaction {
    /// A freshly submitted transaction with nothing but a uid and a
    /// polling URL.
    pub fn pending(uid: impl Into<String>, polling_url: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            tenant_uid: None,
            entity_uid: String::new(),
            entity_url: None,
            polling_url: polling_url.into(),
            submission_time: None,
            last_updated_time: None,
            transaction_type: None,
            status: TransactionStatus::Pending,
            details: BTreeMap::new(),
            error_message: None,
            error_details: BTreeMap::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == TransactionStatus::Done
    }

    pub fn is_error(&self) -> bool {
        self.status == TransactionStatus::Error
    }
}

/// The remote system explicitly reported that a transaction failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "transaction {transaction_uid} (entity {entity_uid}) ended with status {status}: {message}{}",
    render_details(.details)
)]
pub struct TransactionFailure {
    pub transaction_uid: String,
    pub entity_uid: String,
    pub status: TransactionStatus,
    pub message: String,
    pub details: BTreeMap<String, String>,
}

impl TransactionFailure {
    pub fn from_transaction(transaction: &Transaction) -> Self {
        Self {
            transaction_uid: transaction.uid.clone(),
            entity_uid: transaction.entity_uid.clone(),
            status: transaction.status.clone(),
            message: transaction
                .error_message
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "no error message reported".to_owned()),
            details: transaction.error_details.clone(),
        }
    }
}

fn render_details(details: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (i, (key, value)) in details.iter().enumerate() {
        out.push_str(if i == 0 { " (" } else { ", " });
        let _ = write!(out, "{}={}", key, value);
    }
    if !details.is_empty() {
        out.push(')');
    }
    out
}
