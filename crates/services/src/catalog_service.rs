use std::collections::HashSet;
use std::sync::Arc;

use portal_core::model::{ActivityId, Group, NewGroup, NewStudyActivity, StudyActivity};
use storage::repository::{ActivityCatalog, GroupDirectory};

use crate::Clock;
use crate::error::CatalogServiceError;

const DEFAULT_ACTIVITIES: &[(&str, &str)] = &[
    ("Typing Tutor", "Type the word shown on screen"),
    ("Flashcards", "Recall the meaning before flipping the card"),
    ("Word Match", "Pair each word with its translation"),
    ("Listening Practice", "Write down the word you hear"),
];

const DEFAULT_GROUPS: &[(&str, &str)] = &[
    ("Core Verbs", "Everyday actions"),
    ("Common Nouns", "People, places and things"),
    ("Greetings", "Hello, goodbye and polite phrases"),
];

/// Counts of catalog rows created by [`CatalogService::seed_defaults`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedReport {
    pub activities_added: usize,
    pub groups_added: usize,
}

/// Read access to study activities and groups, plus default seeding.
#[derive(Clone)]
pub struct CatalogService {
    clock: Clock,
    activities: Arc<dyn ActivityCatalog>,
    groups: Arc<dyn GroupDirectory>,
}

impl CatalogService {
    #[must_use]
    pub fn new(
        clock: Clock,
        activities: Arc<dyn ActivityCatalog>,
        groups: Arc<dyn GroupDirectory>,
    ) -> Self {
        Self {
            clock,
            activities,
            groups,
        }
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if repository access fails.
    pub async fn list_activities(&self) -> Result<Vec<StudyActivity>, CatalogServiceError> {
        Ok(self.activities.list_activities().await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::ActivityNotFound` for an unknown id.
    pub async fn get_activity(&self, id: ActivityId) -> Result<StudyActivity, CatalogServiceError> {
        self.activities
            .get_activity(id)
            .await?
            .ok_or(CatalogServiceError::ActivityNotFound(id.value()))
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if repository access fails.
    pub async fn list_groups(&self) -> Result<Vec<Group>, CatalogServiceError> {
        Ok(self.groups.list_groups().await?)
    }

    /// Insert the built-in activities and groups that are not present yet.
    ///
    /// Matching is by name, so running this again adds nothing.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if repository access fails.
    pub async fn seed_defaults(&self) -> Result<SeedReport, CatalogServiceError> {
        let now = self.clock.now();
        let mut report = SeedReport::default();

        let existing: HashSet<String> = self
            .activities
            .list_activities()
            .await?
            .into_iter()
            .map(|a| a.name)
            .collect();
        for (name, description) in DEFAULT_ACTIVITIES {
            if existing.contains(*name) {
                continue;
            }
            self.activities
                .insert_activity(&NewStudyActivity {
                    name: (*name).to_owned(),
                    description: (*description).to_owned(),
                    created_at: now,
                })
                .await?;
            report.activities_added += 1;
        }

        let existing: HashSet<String> = self
            .groups
            .list_groups()
            .await?
            .into_iter()
            .map(|g| g.name)
            .collect();
        for (name, description) in DEFAULT_GROUPS {
            if existing.contains(*name) {
                continue;
            }
            self.groups
                .insert_group(&NewGroup {
                    name: (*name).to_owned(),
                    description: (*description).to_owned(),
                    created_at: now,
                })
                .await?;
            report.groups_added += 1;
        }

        tracing::info!(
            activities_added = report.activities_added,
            groups_added = report.groups_added,
            "catalog seeded"
        );
        Ok(report)
    }
}
