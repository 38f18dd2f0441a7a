use tracing::{debug, info, warn};

use super::cache::{CollectionCache, Mutation, MutationOutcome};
use crate::error::{StoreError, SyncError};
use crate::models::{Entity, EntityId, Lecture, Material, Task, TaskPatch, WEEKDAYS};
use crate::services::{SearchHit, SearchIndex, WeeklyGrid, schedule, task_order};
use crate::session::Session;
use crate::store::StoreClient;

/// Everything the signed-in user sees. Dropped on sign-out.
pub struct Workspace {
    session: Session,
    lectures: CollectionCache<Lecture>,
    tasks: CollectionCache<Task>,
    materials: CollectionCache<Material>,
}

/// Entities that have a cache of their own in the workspace.
pub trait Collection: Entity {
    fn cache(workspace: &Workspace) -> &CollectionCache<Self>;
}

impl Collection for Lecture {
    fn cache(workspace: &Workspace) -> &CollectionCache<Self> {
        &workspace.lectures
    }
}

impl Collection for Task {
    fn cache(workspace: &Workspace) -> &CollectionCache<Self> {
        &workspace.tasks
    }
}

impl Collection for Material {
    fn cache(workspace: &Workspace) -> &CollectionCache<Self> {
        &workspace.materials
    }
}

impl Workspace {
    pub async fn open(client: StoreClient, session: Session) -> Self {
        let owner_id = session.user_id;
        let (lectures, tasks, materials) = tokio::join!(
            CollectionCache::open(client.clone(), owner_id),
            CollectionCache::open(client.clone(), owner_id),
            CollectionCache::open(client, owner_id),
        );
        info!(user = %owner_id, "workspace opened");
        Self {
            session,
            lectures,
            tasks,
            materials,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn cache<E: Collection>(&self) -> &CollectionCache<E> {
        E::cache(self)
    }

    pub fn lectures(&self) -> &CollectionCache<Lecture> {
        &self.lectures
    }

    pub fn tasks(&self) -> &CollectionCache<Task> {
        &self.tasks
    }

    pub fn materials(&self) -> &CollectionCache<Material> {
        &self.materials
    }

    /// Lectures whose day is not one of the canonical labels land in no column.
    pub fn weekly_grid(&self) -> WeeklyGrid {
        let lectures = self.lectures.snapshot();
        let grid = schedule::project(&lectures, &WEEKDAYS);
        let unplaced = lectures.len().saturating_sub(grid.lecture_count());
        if unplaced > 0 {
            warn!(user = %self.session.user_id, unplaced, "lectures with an unknown day label");
        }
        grid
    }

    pub fn ordered_tasks(&self) -> Vec<Task> {
        task_order::order(&self.tasks.snapshot())
    }

    /// Indexes the current snapshots of all three collections.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let lectures = self.lectures.snapshot();
        let tasks = self.tasks.snapshot();
        let materials = self.materials.snapshot();
        let index = SearchIndex::build(&lectures, &tasks, &materials);
        if index.is_empty() {
            return Vec::new();
        }
        let hits = index.search(query);
        debug!(entries = index.len(), hits = hits.len(), "search");
        hits
    }

    /// Flips `completed` based on what the snapshot currently shows.
    pub async fn toggle_task(&self, id: EntityId) -> Result<MutationOutcome, SyncError> {
        let task = self
            .tasks
            .find(id)
            .ok_or(SyncError::Store(StoreError::NotFound))?;
        self.tasks
            .mutate(Mutation::Update(id, TaskPatch::completion(!task.completed)))
            .await
    }

    /// Refreshes every collection; reports the first failure.
    pub async fn refresh_all(&self) -> Result<(), SyncError> {
        let (lectures, tasks, materials) = tokio::join!(
            self.lectures.refresh(),
            self.tasks.refresh(),
            self.materials.refresh(),
        );
        lectures?;
        tasks?;
        materials?;
        Ok(())
    }

    pub async fn close(self) {
        let Workspace {
            session,
            lectures,
            tasks,
            materials,
        } = self;
        tokio::join!(lectures.close(), tasks.close(), materials.close());
        info!(user = %session.user_id, "workspace closed");
    }
}
