//! Product records and record sets.
//!
//! A [`Record`] is one product data point belonging to exactly one company.
//! A [`RecordSet`] is an unkeyed collection of records; when a newer snapshot
//! for a company arrives it replaces that company's earlier records wholesale.
//!
//! ## Wire Format
//!
//! Records decode from the row shape used by the product table:
//!
//! ```json
//! {"id": 7, "company_name": "Apple", "product_name": "iPad Pro",
//!  "price": "799.99", "rating": 4.7, "reviews": "1,200"}
//! ```
//!
//! Stores are inconsistent about numeric encodings, so `price`, `rating` and
//! `reviews` accept either JSON numbers or strings. Strings may carry a
//! currency sign and thousands separators.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::entity::{Entity, EntityKey, EntitySet};
use crate::error::{Error, Result};

/// Upper bound of the rating scale.
pub const MAX_RATING: f64 = 5.0;

/// One product data point attached to a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned row identifier, if any.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_id"
    )]
    pub id: Option<String>,
    /// Company the product belongs to.
    pub company_name: String,
    /// Product display name.
    pub product_name: String,
    /// Price in store currency units.
    #[serde(deserialize_with = "lenient::price")]
    pub price: f64,
    /// Average rating on a 0-5 scale.
    #[serde(deserialize_with = "lenient::rating")]
    pub rating: f64,
    /// Number of reviews behind the rating.
    #[serde(deserialize_with = "lenient::count")]
    pub reviews: u64,
    /// Optional product category label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// When the store first saw this row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Creates a validated record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] if the price is negative or not
    /// finite, or the rating is outside `0..=5`.
    pub fn new(
        company_name: impl Into<String>,
        product_name: impl Into<String>,
        price: f64,
        rating: f64,
        reviews: u64,
    ) -> Result<Self> {
        let record = Self {
            id: None,
            company_name: company_name.into(),
            product_name: product_name.into(),
            price,
            rating,
            reviews,
            category: None,
            created_at: None,
        };
        record.validate()?;
        Ok(record)
    }

    /// Sets the category label.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the store row identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        check_price(self.price).map_err(Error::invalid_record)?;
        check_rating(self.rating).map_err(Error::invalid_record)?;
        if self.company_name.trim().is_empty() {
            return Err(Error::invalid_record("company name is empty"));
        }
        Ok(())
    }

    /// Returns the entity this record belongs to.
    #[must_use]
    pub fn entity(&self) -> Entity {
        Entity::unchecked(&self.company_name)
    }

    /// Returns the normalised key of the owning entity.
    #[must_use]
    pub fn entity_key(&self) -> EntityKey {
        EntityKey::new(&self.company_name)
    }

    /// Orders records best-first: higher rating, then more reviews.
    #[must_use]
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .rating
            .total_cmp(&self.rating)
            .then_with(|| other.reviews.cmp(&self.reviews))
    }

    fn content_cmp(&self, other: &Self) -> Ordering {
        self.entity_key()
            .cmp(&other.entity_key())
            .then_with(|| self.product_name.cmp(&other.product_name))
            .then_with(|| self.price.total_cmp(&other.price))
            .then_with(|| self.rating.total_cmp(&other.rating))
            .then_with(|| self.reviews.cmp(&other.reviews))
            .then_with(|| self.category.cmp(&other.category))
            .then_with(|| self.id.cmp(&other.id))
    }
}

fn check_price(price: f64) -> std::result::Result<(), String> {
    if price.is_finite() && price >= 0.0 {
        Ok(())
    } else {
        Err(format!("price {price} must be a non-negative number"))
    }
}

fn check_rating(rating: f64) -> std::result::Result<(), String> {
    if (0.0..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(format!("rating {rating} is outside 0..={MAX_RATING}"))
    }
}

/// A collection of records, unkeyed and unordered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    /// Creates an empty record set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Returns the records as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Record] {
        &self.records
    }

    /// Consumes the set and returns the records.
    #[must_use]
    pub fn into_vec(self) -> Vec<Record> {
        self.records
    }

    /// Returns the entities that have at least one record.
    #[must_use]
    pub fn entities(&self) -> EntitySet {
        self.records.iter().map(Record::entity).collect()
    }

    /// Returns the records belonging to `entity`.
    pub fn for_entity<'a>(&'a self, entity: &'a Entity) -> impl Iterator<Item = &'a Record> + 'a {
        self.records
            .iter()
            .filter(move |r| &r.entity_key() == entity.key())
    }

    /// Groups records by owning entity.
    #[must_use]
    pub fn by_entity(&self) -> BTreeMap<EntityKey, Vec<&Record>> {
        let mut groups: BTreeMap<EntityKey, Vec<&Record>> = BTreeMap::new();
        for record in &self.records {
            groups.entry(record.entity_key()).or_default().push(record);
        }
        groups
    }

    /// Drops every record whose entity is not in `entities`.
    pub fn retain_entities(&mut self, entities: &EntitySet) {
        self.records
            .retain(|r| entities.contains_key(&r.entity_key()));
    }

    /// Merges a newer snapshot into this set.
    ///
    /// For every entity present in `newer`, all existing records of that
    /// entity are replaced by the newer ones. Entities absent from `newer`
    /// keep their records.
    pub fn supersede(&mut self, newer: Self) {
        if newer.is_empty() {
            return;
        }
        let replaced = newer.entities();
        self.records
            .retain(|r| !replaced.contains_key(&r.entity_key()));
        self.records.extend(newer.records);
    }

    /// Returns the best record per entity.
    ///
    /// The best record has the highest rating; ties go to the record with
    /// more reviews. Output is ordered by entity key.
    #[must_use]
    pub fn best_per_entity(&self) -> Self {
        self.by_entity()
            .into_values()
            .filter_map(|group| group.into_iter().min_by(|a, b| a.rank_cmp(b)).cloned())
            .collect()
    }

    /// Returns true if both sets hold the same records, ignoring order.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mut mine: Vec<&Record> = self.records.iter().collect();
        let mut theirs: Vec<&Record> = other.records.iter().collect();
        mine.sort_by(|a, b| a.content_cmp(b));
        theirs.sort_by(|a, b| a.content_cmp(b));
        mine == theirs
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl Extend<Record> for RecordSet {
    fn extend<T: IntoIterator<Item = Record>>(&mut self, iter: T) {
        self.records.extend(iter);
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Lenient decoders for numeric columns.
mod lenient {
    use super::{Deserialize, Deserializer, check_price, check_rating};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Numeric {
        Int(u64),
        Float(f64),
        Text(String),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Identifier {
        Int(i64),
        Text(String),
    }

    fn clean(text: &str) -> String {
        text.chars()
            .filter(|c| !matches!(c, '$' | ',' | ' ' | '\u{a0}'))
            .collect()
    }

    fn as_f64<E: serde::de::Error>(value: Numeric, field: &str) -> Result<f64, E> {
        match value {
            #[allow(clippy::cast_precision_loss)]
            Numeric::Int(n) => Ok(n as f64),
            Numeric::Float(f) => Ok(f),
            Numeric::Text(s) => clean(&s)
                .parse::<f64>()
                .map_err(|_| E::custom(format!("{field} '{s}' is not a number"))),
        }
    }

    pub(super) fn price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = as_f64(Numeric::deserialize(deserializer)?, "price")?;
        check_price(value).map_err(serde::de::Error::custom)?;
        Ok(value)
    }

    pub(super) fn rating<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = as_f64(Numeric::deserialize(deserializer)?, "rating")?;
        check_rating(value).map_err(serde::de::Error::custom)?;
        Ok(value)
    }

    pub(super) fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Numeric::deserialize(deserializer)? {
            Numeric::Int(n) => Ok(n),
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Numeric::Float(f) if f >= 0.0 && f.fract() == 0.0 && f <= 9.0e15 => Ok(f as u64),
            Numeric::Float(f) => Err(serde::de::Error::custom(format!(
                "reviews {f} is not a whole number"
            ))),
            Numeric::Text(s) => clean(&s).parse::<u64>().map_err(|_| {
                serde::de::Error::custom(format!("reviews '{s}' is not a whole number"))
            }),
        }
    }

    pub(super) fn optional_id<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(Option::<Identifier>::deserialize(deserializer)?.map(|id| match id {
            Identifier::Int(n) => n.to_string(),
            Identifier::Text(s) => s,
        }))
    }
}
