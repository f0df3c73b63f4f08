//! Value columns of an event metric definition.
//!
//! A column set starts open, accepts new columns, and is frozen by
//! [`ValueColumnSet::lock`], which assigns every column its final index
//! in insertion order.

use crate::core::{Result, TelemetryError};
use crate::metrics::types::{normalize, Trend, ValueType};
use ahash::AHashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const UNASSIGNED: usize = usize::MAX;

/// One named, typed field of an event metric
pub struct ValueColumn {
    name: String,
    value_type: ValueType,
    trendable: bool,
    default_trend: Trend,
    caption: Option<String>,
    description: Option<String>,
    unit_caption: Option<String>,
    index: AtomicUsize,
}

impl ValueColumn {
    fn new(name: &str, value_type: ValueType, options: ColumnOptions) -> Self {
        let trendable = options.trendable.unwrap_or_else(|| value_type.is_trendable());
        Self {
            name: name.to_owned(),
            value_type,
            trendable,
            default_trend: options.default_trend.unwrap_or_else(|| value_type.default_trend()),
            caption: options.caption,
            description: options.description,
            unit_caption: options.unit_caption,
            index: AtomicUsize::new(UNASSIGNED),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn is_trendable(&self) -> bool {
        self.trendable
    }

    pub fn default_trend(&self) -> Trend {
        self.default_trend
    }

    /// Display caption, falling back to the name
    pub fn caption(&self) -> &str {
        self.caption.as_deref().unwrap_or(&self.name)
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn unit_caption(&self) -> Option<&str> {
        self.unit_caption.as_deref()
    }

    /// Position in the sample value array. `None` until the owning
    /// definition is locked.
    #[inline]
    pub fn index(&self) -> Option<usize> {
        match self.index.load(Ordering::Acquire) {
            UNASSIGNED => None,
            idx => Some(idx),
        }
    }
}

impl fmt::Debug for ValueColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueColumn")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("trendable", &self.trendable)
            .field("default_trend", &self.default_trend)
            .field("index", &self.index())
            .finish()
    }
}

/// Optional settings for a new column
#[derive(Debug, Clone, Default)]
pub struct ColumnOptions {
    pub caption: Option<String>,
    pub description: Option<String>,
    pub unit_caption: Option<String>,
    /// Overrides the type's default trendability
    pub trendable: Option<bool>,
    /// Overrides the type's default trend
    pub default_trend: Option<Trend>,
}

impl ColumnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn unit_caption(mut self, unit: impl Into<String>) -> Self {
        self.unit_caption = Some(unit.into());
        self
    }

    pub fn trendable(mut self, trendable: bool) -> Self {
        self.trendable = Some(trendable);
        self
    }

    pub fn trend(mut self, trend: Trend) -> Self {
        self.default_trend = Some(trend);
        self
    }
}

struct ColumnSetInner {
    locked: bool,
    columns: Vec<Arc<ValueColumn>>,
    by_name: AHashMap<String, Arc<ValueColumn>>,
    default_column: Option<Arc<ValueColumn>>,
}

/// Ordered, case-insensitively named set of value columns
pub struct ValueColumnSet {
    definition: String,
    inner: Mutex<ColumnSetInner>,
}

impl ValueColumnSet {
    /// `definition` is the owning definition's key, used in error messages.
    pub fn new(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
            inner: Mutex::new(ColumnSetInner {
                locked: false,
                columns: Vec::new(),
                by_name: AHashMap::new(),
                default_column: None,
            }),
        }
    }

    /// Add a column. Fails once the set is locked or if the name is taken.
    pub fn add(&self, name: &str, value_type: ValueType, options: ColumnOptions) -> Result<Arc<ValueColumn>> {
        let mut inner = self.inner.lock();
        if inner.locked {
            return Err(TelemetryError::AlreadyLocked(self.definition.clone()));
        }
        self.insert(&mut inner, name, value_type, options)
    }

    /// Add a column while reconstructing a definition from stored data.
    ///
    /// Skips the lock check but still enforces unique names. On a locked
    /// set the new column gets the next index immediately.
    pub fn rehydrate(&self, name: &str, value_type: ValueType, options: ColumnOptions) -> Result<Arc<ValueColumn>> {
        let mut inner = self.inner.lock();
        let column = self.insert(&mut inner, name, value_type, options)?;
        if inner.locked {
            column.index.store(inner.columns.len() - 1, Ordering::Release);
        }
        Ok(column)
    }

    fn insert(
        &self,
        inner: &mut ColumnSetInner,
        name: &str,
        value_type: ValueType,
        options: ColumnOptions,
    ) -> Result<Arc<ValueColumn>> {
        let key = normalize(name);
        if inner.by_name.contains_key(&key) {
            return Err(TelemetryError::DuplicateColumnName {
                definition: self.definition.clone(),
                column: name.to_owned(),
            });
        }

        let column = Arc::new(ValueColumn::new(name, value_type, options));
        inner.by_name.insert(key, Arc::clone(&column));
        inner.columns.push(Arc::clone(&column));
        Ok(column)
    }

    /// Remove a column from an open set
    pub fn remove(&self, name: &str) -> Result<Arc<ValueColumn>> {
        let mut inner = self.inner.lock();
        if inner.locked {
            return Err(TelemetryError::AlreadyLocked(self.definition.clone()));
        }

        let column = inner
            .by_name
            .remove(&normalize(name))
            .ok_or_else(|| TelemetryError::unknown_column(&self.definition, name))?;
        inner.columns.retain(|c| !Arc::ptr_eq(c, &column));
        if inner.default_column.as_ref().is_some_and(|d| Arc::ptr_eq(d, &column)) {
            inner.default_column = None;
        }
        Ok(column)
    }

    /// Freeze the set and assign each column its index in insertion order.
    ///
    /// Calling this again reassigns the same indices and is not an error.
    /// Returns the number of columns.
    pub fn lock(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.locked = true;
        for (idx, column) in inner.columns.iter().enumerate() {
            column.index.store(idx, Ordering::Release);
        }
        inner.columns.len()
    }

    pub fn is_locked(&self) -> bool {
        self.inner.lock().locked
    }

    pub fn len(&self) -> usize {
        self.inner.lock().columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Case-insensitive lookup by name
    pub fn get(&self, name: &str) -> Result<Arc<ValueColumn>> {
        self.inner
            .lock()
            .by_name
            .get(&normalize(name))
            .cloned()
            .ok_or_else(|| TelemetryError::unknown_column(&self.definition, name))
    }

    /// Lookup by index; only meaningful once the set is locked
    pub fn get_index(&self, index: usize) -> Result<Arc<ValueColumn>> {
        let inner = self.inner.lock();
        if !inner.locked {
            return Err(TelemetryError::unknown_column(&self.definition, index));
        }
        inner
            .columns
            .get(index)
            .cloned()
            .ok_or_else(|| TelemetryError::unknown_column(&self.definition, index))
    }

    /// True if `column` is one of this set's columns (same handle)
    pub fn contains(&self, column: &Arc<ValueColumn>) -> bool {
        self.inner
            .lock()
            .by_name
            .get(&normalize(column.name()))
            .is_some_and(|c| Arc::ptr_eq(c, column))
    }

    /// Columns in insertion order
    pub fn columns(&self) -> Vec<Arc<ValueColumn>> {
        self.inner.lock().columns.clone()
    }

    /// Nominate the column trended when a caller asks for the default trend
    pub fn set_default_column(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.locked {
            return Err(TelemetryError::AlreadyLocked(self.definition.clone()));
        }
        let column = inner
            .by_name
            .get(&normalize(name))
            .cloned()
            .ok_or_else(|| TelemetryError::unknown_column(&self.definition, name))?;
        inner.default_column = Some(column);
        Ok(())
    }

    pub fn default_column(&self) -> Option<Arc<ValueColumn>> {
        self.inner.lock().default_column.clone()
    }

    pub(crate) fn definition_key(&self) -> &str {
        &self.definition
    }
}

impl fmt::Debug for ValueColumnSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ValueColumnSet")
            .field("definition", &self.definition)
            .field("locked", &inner.locked)
            .field("columns", &inner.columns)
            .finish()
    }
}
