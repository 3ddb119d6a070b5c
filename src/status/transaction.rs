// Author: Jacques Murray

//! Classifier for platform transactions.

use super::StatusError;
use crate::retry::Outcome;
use crate::transaction::{Transaction, TransactionFailure, TransactionStatus};

pub fn classify_transaction(transaction: &Transaction) -> Outcome<StatusError> {
    match &transaction.status {
        TransactionStatus::Done => Outcome::Done,
        TransactionStatus::Pending | TransactionStatus::InProgress => Outcome::Pending,
        TransactionStatus::Error => {
            Outcome::Fatal(TransactionFailure::from_transaction(transaction).into())
        }
        TransactionStatus::Unknown(status) => Outcome::Fatal(StatusError::UnknownStatus {
            vocabulary: "transaction",
            status: status.clone(),
        }),
    }
}
