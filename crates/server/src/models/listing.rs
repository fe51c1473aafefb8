use serde::Deserialize;

use crate::error::{RequestError, ValidationError};
use crate::server::constants::MAX_LISTING_ELEMENTS;
pub const DEFAULT_LIMIT: i32 = 20;

#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub limit: Option<String>,
    #[serde(rename = "nextToken")]
    pub next_token: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Listing {
    pub limit: i32,
    pub next_token: Option<String>,
}

pub fn parse_limit(limit: &str) -> Result<i32, RequestError> {
    limit.trim().parse().map_err(|_| {
        ValidationError::InvalidInput {
            value: limit.to_string(),
            reason: "limit should be an integer".to_string(),
        }
        .into()
    })
}

pub fn validate_limit(limit: i32) -> Result<(), RequestError> {
    if limit < 1 {
        return Err(ValidationError::InvalidInput {
            value: limit.to_string(),
            reason: "limit should be >= 1".to_string(),
        }
        .into());
    }
    if limit > MAX_LISTING_ELEMENTS {
        return Err(ValidationError::LimitExceeded {
            subject: "listing limit".to_string(),
            unit: "element".to_string(),
            attempted: limit as usize,
            limit: MAX_LISTING_ELEMENTS as usize,
        }
        .into());
    }
    Ok(())
}

impl Listing {
    pub fn from_query(query: ListingQuery) -> Result<Self, RequestError> {
        let limit = match query.limit.as_deref() {
            Some(limit) => parse_limit(limit)?,
            None => DEFAULT_LIMIT,
        };
        validate_limit(limit)?;
        let next_token = query.next_token.filter(|t| !t.is_empty());
        Ok(Self { limit, next_token })
    }
}
