//! Backend operation names.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// An operation of the remote database API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateTable,
    DeleteTable,
    DescribeTable,
    ListTables,
    UpdateTable,
    PutItem,
    GetItem,
    DeleteItem,
    UpdateItem,
    Query,
    Scan,
    BatchGetItem,
    BatchWriteItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operation '{0}'")]
pub struct UnknownOperation(pub String);

impl Operation {
    pub const ALL: [Operation; 13] = [
        Operation::CreateTable,
        Operation::DeleteTable,
        Operation::DescribeTable,
        Operation::ListTables,
        Operation::UpdateTable,
        Operation::PutItem,
        Operation::GetItem,
        Operation::DeleteItem,
        Operation::UpdateItem,
        Operation::Query,
        Operation::Scan,
        Operation::BatchGetItem,
        Operation::BatchWriteItem,
    ];

    /// Wire name, as used in the target header and in route paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateTable => "CreateTable",
            Operation::DeleteTable => "DeleteTable",
            Operation::DescribeTable => "DescribeTable",
            Operation::ListTables => "ListTables",
            Operation::UpdateTable => "UpdateTable",
            Operation::PutItem => "PutItem",
            Operation::GetItem => "GetItem",
            Operation::DeleteItem => "DeleteItem",
            Operation::UpdateItem => "UpdateItem",
            Operation::Query => "Query",
            Operation::Scan => "Scan",
            Operation::BatchGetItem => "BatchGetItem",
            Operation::BatchWriteItem => "BatchWriteItem",
        }
    }

    /// Top-level request fields checked before a validated call.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Operation::CreateTable => &["TableName", "KeySchema", "AttributeDefinitions"],
            Operation::DeleteTable
            | Operation::DescribeTable
            | Operation::UpdateTable
            | Operation::Query
            | Operation::Scan => &["TableName"],
            Operation::PutItem => &["TableName", "Item"],
            Operation::GetItem | Operation::DeleteItem | Operation::UpdateItem => {
                &["TableName", "Key"]
            }
            Operation::ListTables => &[],
            Operation::BatchGetItem | Operation::BatchWriteItem => &["RequestItems"],
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>(), Ok(op));
        }
    }

    #[test]
    fn unknown_and_case_sensitive() {
        assert!("describetable".parse::<Operation>().is_err());
        assert_eq!(
            "Frobnicate".parse::<Operation>(),
            Err(UnknownOperation("Frobnicate".into()))
        );
    }
}
