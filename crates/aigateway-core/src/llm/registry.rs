//! Provider registry: category-keyed, round-robin, read-mostly after startup.
//!
//! Grounded on the reference codebase's `ProviderRegistry` (name-keyed
//! `HashMap`), generalized per SPEC_FULL.md §3/§4.2 to group providers by
//! `Category` with an ordered list and a per-category rotation cursor.

use std::sync::atomic::{AtomicUsize, Ordering};

use aigateway_types::error::{ClassifiedError, ErrorCode};
use aigateway_types::llm::Category;
use dashmap::DashMap;

use super::box_provider::BoxProvider;

struct CategorySlot {
    providers: Vec<BoxProvider>,
    cursor: AtomicUsize,
}

/// Read-mostly introspection snapshot for a single category.
#[derive(Debug, Clone)]
pub struct CategoryStats {
    pub category: Category,
    pub provider_count: usize,
    pub provider_names: Vec<String>,
}

/// Process-wide provider registry.
///
/// Registration happens once at startup; after that, every operation is a
/// read plus an atomic cursor bump, so no lock is held across a provider
/// invocation (see SPEC_FULL.md §5, "read-mostly after startup").
#[derive(Default)]
pub struct Registry {
    slots: DashMap<Category, CategorySlot>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Append a provider to its category's list, preserving registration
    /// order. Logs whether this is the category's first registration or an
    /// addition to an existing list.
    pub fn register(&self, category: Category, provider: BoxProvider) {
        let mut slot = self.slots.entry(category).or_insert_with(|| CategorySlot {
            providers: Vec::new(),
            cursor: AtomicUsize::new(0),
        });
        if slot.providers.is_empty() {
            tracing::info!(%category, provider = provider.name(), "registered first provider for category");
        } else {
            tracing::info!(%category, provider = provider.name(), total = slot.providers.len() + 1, "registered additional provider");
        }
        slot.providers.push(provider);
    }

    /// Return the next provider in round-robin order for `category`.
    ///
    /// Fails with `SERVICE_ERROR` if the category has no registrations.
    /// The cursor is shared state advanced on every call, so successive
    /// `execute` calls against the same category naturally spread load.
    pub fn get_next(&self, category: Category) -> Result<BoxProvider, ClassifiedError> {
        let slot = self.slots.get(&category).ok_or_else(|| {
            ClassifiedError::with_code(
                category.to_string(),
                format!("no providers registered for category '{category}'"),
                ErrorCode::ServiceError,
            )
        })?;
        if slot.providers.is_empty() {
            return Err(ClassifiedError::with_code(
                category.to_string(),
                format!("no providers registered for category '{category}'"),
                ErrorCode::ServiceError,
            ));
        }
        let idx = slot.cursor.fetch_add(1, Ordering::Relaxed) % slot.providers.len();
        Ok(slot.providers[idx].clone())
    }

    /// Return the full ordered provider list for `category` (possibly empty).
    pub fn get_all(&self, category: Category) -> Vec<BoxProvider> {
        self.slots
            .get(&category)
            .map(|slot| slot.providers.clone())
            .unwrap_or_default()
    }

    pub fn has_category(&self, category: Category) -> bool {
        self.slots
            .get(&category)
            .map(|slot| !slot.providers.is_empty())
            .unwrap_or(false)
    }

    pub fn get_categories(&self) -> Vec<Category> {
        self.slots
            .iter()
            .filter(|entry| !entry.value().providers.is_empty())
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn get_stats(&self) -> Vec<CategoryStats> {
        self.slots
            .iter()
            .map(|entry| CategoryStats {
                category: *entry.key(),
                provider_count: entry.value().providers.len(),
                provider_names: entry
                    .value()
                    .providers
                    .iter()
                    .map(|p| p.name().to_string())
                    .collect(),
            })
            .collect()
    }
}
