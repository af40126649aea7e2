//! Project catalog: project id → name and unit price.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use numlease_types::{LeaseError, Project, ProjectId, Result};
use rust_decimal::Decimal;

/// Read-only price lookup used by the lease manager.
pub trait ProjectCatalog: Send + Sync {
    fn lookup(&self, id: &ProjectId) -> Option<Project>;
}

/// A catalog held in memory. Prices may change at any time; leases keep
/// the price they were created with.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    projects: RwLock<BTreeMap<ProjectId, Project>>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from `projects`.
    ///
    /// # Errors
    /// Returns `InvalidAmount` if any price is negative.
    pub fn with_projects(projects: impl IntoIterator<Item = Project>) -> Result<Self> {
        let catalog = Self::new();
        for project in projects {
            catalog.upsert(project)?;
        }
        Ok(catalog)
    }

    /// Insert or replace a project.
    pub fn upsert(&self, project: Project) -> Result<()> {
        check_price(project.unit_price)?;
        self.projects.write()?.insert(project.id.clone(), project);
        Ok(())
    }

    /// Change the unit price of an existing project.
    pub fn set_price(&self, id: &ProjectId, unit_price: Decimal) -> Result<()> {
        check_price(unit_price)?;
        let mut projects = self.projects.write()?;
        let project = projects
            .get_mut(id)
            .ok_or_else(|| LeaseError::UnknownProject(id.clone()))?;
        tracing::info!(project = %id, old = %project.unit_price, new = %unit_price, "Price changed");
        project.unit_price = unit_price;
        Ok(())
    }

    /// Projects matching `id` exactly and whose name contains `name`
    /// (case-insensitive). A `None` criterion matches everything.
    pub fn search(&self, id: Option<&ProjectId>, name: Option<&str>) -> Result<Vec<Project>> {
        let needle = name.map(str::to_lowercase);
        let projects = self.projects.read()?;
        Ok(projects
            .values()
            .filter(|p| id.is_none_or(|id| &p.id == id))
            .filter(|p| {
                needle
                    .as_deref()
                    .is_none_or(|n| p.name.to_lowercase().contains(n))
            })
            .cloned()
            .collect())
    }

    /// Every project, sorted by id.
    pub fn list(&self) -> Result<Vec<Project>> {
        Ok(self.projects.read()?.values().cloned().collect())
    }
}

impl ProjectCatalog for InMemoryCatalog {
    fn lookup(&self, id: &ProjectId) -> Option<Project> {
        // Entries are replaced whole, so a poisoned map is still coherent.
        self.projects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

fn check_price(price: Decimal) -> Result<()> {
    if price < Decimal::ZERO {
        return Err(LeaseError::InvalidAmount(price));
    }
    Ok(())
}
