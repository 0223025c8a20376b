#![allow(missing_docs)]

//! `CREATE VECTOR INDEX <table>.<prop> WITH (<opt>=<val>, ...)` option-clause
//! parsing.
//!
//! This is the only slice of the Cypher-level DDL surface the core consumes
//! (§6.1); the surrounding `CREATE`/`UPDATE VECTOR INDEX` statements, the
//! binder, and the physical-plan mapper are external collaborators.

use pest::Parser;
use pest_derive::Parser;

use crate::config::{DistanceFunc, IndexConfig};
use crate::error::ConfigError;

/// The pest parser for the `WITH (...)` option clause.
#[derive(Parser)]
#[grammar = "ddl.pest"]
pub struct OptionClauseParser;

/// Parses a `WITH (...)` option clause into an [`IndexConfig`], starting
/// from `base` (typically `IndexConfig::new(dim)`).
///
/// Recognizes, case-insensitively: `MAXNBRSATUPPERLEVEL`,
/// `MAXNBRSATLOWERLEVEL`, `SAMPLINGPROBABILITY`, `EFCONSTRUCTION`,
/// `EFSEARCH`, `ALPHA`, `NUMVECTORSPERPARTITION`, `SQENABLED`,
/// `DISTANCEFUNC`.
///
/// # Errors
///
/// Returns [`ConfigError::UnrecognizedOption`] for any other key, and
/// [`ConfigError::InvalidOptionValue`] when a recognized key's value fails
/// to parse as the expected type. The clause is parsed but not validated
/// against `[ConfigError::InvalidDimension`]/sampling-probability-range
/// rules here — call [`IndexConfig::validate`] on the result.
pub fn parse_with_clause(input: &str, base: IndexConfig) -> Result<IndexConfig, ConfigError> {
    let pairs = OptionClauseParser::parse(Rule::option_clause, input)
        .map_err(|e| ConfigError::InvalidOptionValue {
            key: "<clause>".to_string(),
            value: e.to_string(),
        })?;

    let mut config = base;
    for pair in pairs {
        if pair.as_rule() != Rule::option_clause {
            continue;
        }
        for option_pair in pair.into_inner() {
            if option_pair.as_rule() != Rule::option_pair {
                continue;
            }
            let mut inner = option_pair.into_inner();
            let key = inner.next().expect("option_pair always has a key").as_str();
            let value = inner.next().expect("option_pair always has a value").as_str();
            apply_option(&mut config, key, value)?;
        }
    }
    Ok(config)
}

fn apply_option(config: &mut IndexConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let unquoted = value.trim_matches('"');
    let invalid = |key: &str, value: &str| ConfigError::InvalidOptionValue {
        key: key.to_string(),
        value: value.to_string(),
    };

    match key.to_ascii_uppercase().as_str() {
        "MAXNBRSATUPPERLEVEL" => {
            config.max_nbrs_at_upper_level =
                unquoted.parse().map_err(|_| invalid(key, value))?;
        }
        "MAXNBRSATLOWERLEVEL" => {
            config.max_nbrs_at_lower_level =
                unquoted.parse().map_err(|_| invalid(key, value))?;
        }
        "SAMPLINGPROBABILITY" => {
            config.sampling_probability = unquoted.parse().map_err(|_| invalid(key, value))?;
        }
        "EFCONSTRUCTION" => {
            config.ef_construction = unquoted.parse().map_err(|_| invalid(key, value))?;
        }
        "EFSEARCH" => {
            config.ef_search = unquoted.parse().map_err(|_| invalid(key, value))?;
        }
        "ALPHA" => {
            config.alpha = unquoted.parse().map_err(|_| invalid(key, value))?;
        }
        "GAMMA" => {
            config.gamma = unquoted.parse().map_err(|_| invalid(key, value))?;
        }
        "NUMVECTORSPERPARTITION" => {
            config.num_vectors_per_partition =
                unquoted.parse().map_err(|_| invalid(key, value))?;
        }
        "SQENABLED" => {
            config.sq_enabled = match unquoted.to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                _ => return Err(invalid(key, value)),
            };
        }
        "DISTANCEFUNC" => {
            config.distance_func = DistanceFunc::parse(unquoted)?;
        }
        other => return Err(ConfigError::UnrecognizedOption(other.to_string())),
    }
    Ok(())
}
