//! Client transaction status.

use crate::net::Error;

/// Transaction status as seen by the client. `Intermediate` is
/// the state between extended-protocol steps: the server owes a
/// ReadyForQuery and no status byte exists for it on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Idle,
    InTransaction,
    Error,
    Intermediate,
}

impl TxStatus {
    /// Decode the ReadyForQuery status byte.
    pub fn from_code(code: char) -> Result<Self, Error> {
        match code {
            'I' => Ok(TxStatus::Idle),
            'T' => Ok(TxStatus::InTransaction),
            'E' => Ok(TxStatus::Error),
            code => Err(Error::UnknownTransactionStatus(code)),
        }
    }

    /// A transaction is in progress.
    pub fn active(&self) -> bool {
        matches!(self, TxStatus::InTransaction)
    }

    /// The more degraded of two statuses; used when aggregating
    /// across shards.
    pub fn worst(self, other: Self) -> Self {
        let rank = |status: &TxStatus| match status {
            TxStatus::Idle => 0,
            TxStatus::Intermediate => 1,
            TxStatus::InTransaction => 2,
            TxStatus::Error => 3,
        };

        if rank(&other) > rank(&self) {
            other
        } else {
            self
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_code() {
        assert_eq!(TxStatus::from_code('I').unwrap(), TxStatus::Idle);
        assert_eq!(TxStatus::from_code('T').unwrap(), TxStatus::InTransaction);
        assert_eq!(TxStatus::from_code('E').unwrap(), TxStatus::Error);
        assert!(TxStatus::from_code('X').is_err());
    }

    #[test]
    fn test_worst() {
        assert_eq!(
            TxStatus::Idle.worst(TxStatus::Error),
            TxStatus::Error
        );
        assert_eq!(
            TxStatus::InTransaction.worst(TxStatus::Idle),
            TxStatus::InTransaction
        );
    }
}
