//! Deterministic keyword-based generator for the demo database.
//!
//! Used when no language model is configured or the configured one fails.
//! Rules are checked in order; the first whose keywords all appear in the
//! lowercased question wins.

use async_trait::async_trait;

use super::{GenerationContext, SqlGenerator};
use crate::error::Result;

/// Query returned when no rule matches.
pub const DEFAULT_QUERY: &str = "SELECT customerName, city, country FROM customers";

struct Rule {
    /// Every group must match; a group matches if any of its words appears.
    all_of: &'static [&'static [&'static str]],
    sql: &'static str,
}

const RULES: &[Rule] = &[
    Rule {
        all_of: &[&["customer"], &["france"]],
        sql: "SELECT customerName, city, country FROM customers WHERE country = 'France'",
    },
    Rule {
        all_of: &[&["product"], &["price", "cost"]],
        sql: "SELECT productName, buyPrice, MSRP FROM products",
    },
    Rule {
        all_of: &[&["top"], &["customer"], &["credit"]],
        sql: "SELECT customerName, creditLimit FROM customers ORDER BY creditLimit DESC LIMIT 5",
    },
    Rule {
        all_of: &[&["first"], &["10"]],
        sql: "SELECT customerName, city, country FROM customers LIMIT 10",
    },
    Rule {
        all_of: &[&["order"], &["2023"]],
        sql: "SELECT orderNumber, orderDate, status FROM orders WHERE YEAR(orderDate) = 2023",
    },
    Rule {
        all_of: &[&["employee"], &["job"]],
        sql: "SELECT firstName, lastName, jobTitle FROM employees",
    },
    Rule {
        all_of: &[&["product"], &["stock"]],
        sql: "SELECT productName, quantityInStock FROM products WHERE quantityInStock > 0",
    },
    Rule {
        all_of: &[&["customer"], &["order"], &["status"]],
        sql: "SELECT c.customerName, o.orderNumber, o.status FROM customers c JOIN orders o ON c.customerNumber = o.customerNumber",
    },
    Rule {
        all_of: &[&["customer"]],
        sql: "SELECT customerName, city, country FROM customers",
    },
    Rule {
        all_of: &[&["product"]],
        sql: "SELECT productName, productLine, buyPrice FROM products",
    },
    Rule {
        all_of: &[&["order"]],
        sql: "SELECT orderNumber, orderDate, status FROM orders",
    },
    Rule {
        all_of: &[&["employee"]],
        sql: "SELECT firstName, lastName, jobTitle FROM employees",
    },
];

/// Maps questions about the `classicmodels` sample database to fixed queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordGenerator;

impl KeywordGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Picks the query for `question`. Never fails.
    pub fn query_for(&self, question: &str) -> &'static str {
        let lowered = question.to_lowercase();
        RULES
            .iter()
            .find(|rule| {
                rule.all_of
                    .iter()
                    .all(|group| group.iter().any(|word| lowered.contains(word)))
            })
            .map(|rule| rule.sql)
            .unwrap_or(DEFAULT_QUERY)
    }
}

#[async_trait]
impl SqlGenerator for KeywordGenerator {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn generate(&self, question: &str, _context: &GenerationContext) -> Result<String> {
        Ok(self.query_for(question).to_string())
    }
}
