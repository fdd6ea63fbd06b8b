use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ApiError;

/// Something a repository can store.
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;

    /// Value that must be unique across the repository, if any.
    fn unique_key(&self) -> Option<&str> {
        None
    }
}

#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Store `item`. Fails with `Conflict` when its unique key is taken.
    async fn insert(&self, item: T) -> Result<T, ApiError>;

    async fn get(&self, id: Uuid) -> Option<T>;

    async fn list(&self) -> Vec<T>;
}

/// In-memory repository. Listing order follows insertion order.
pub struct InMemoryRepository<T> {
    items: RwLock<Table<T>>,
}

struct Table<T> {
    by_id: HashMap<Uuid, T>,
    order: Vec<Uuid>,
}

impl<T: Entity> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Table {
                by_id: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }
}

impl<T: Entity> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for InMemoryRepository<T> {
    async fn insert(&self, item: T) -> Result<T, ApiError> {
        let mut table = self.items.write().await;

        if let Some(key) = item.unique_key() {
            if table
                .by_id
                .values()
                .any(|existing| existing.unique_key() == Some(key))
            {
                return Err(ApiError::Conflict(format!("'{}' already exists", key)));
            }
        }

        if table.by_id.insert(item.id(), item.clone()).is_none() {
            table.order.push(item.id());
        }
        Ok(item)
    }

    async fn get(&self, id: Uuid) -> Option<T> {
        self.items.read().await.by_id.get(&id).cloned()
    }

    async fn list(&self) -> Vec<T> {
        let table = self.items.read().await;
        table
            .order
            .iter()
            .filter_map(|id| table.by_id.get(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Named {
        id: Uuid,
        name: String,
    }

    impl Entity for Named {
        fn id(&self) -> Uuid {
            self.id
        }

        fn unique_key(&self) -> Option<&str> {
            Some(&self.name)
        }
    }

    fn named(name: &str) -> Named {
        Named {
            id: Uuid::new_v4(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_get() {
        let repo = InMemoryRepository::<Named>::new();
        let item = repo.insert(named("alice")).await.unwrap();

        assert_eq!(repo.get(item.id).await, Some(item));
        assert_eq!(repo.get(Uuid::new_v4()).await, None);
    }

    #[tokio::test]
    async fn test_unique_key_conflict() {
        let repo = InMemoryRepository::<Named>::new();
        repo.insert(named("alice")).await.unwrap();

        assert!(matches!(
            repo.insert(named("alice")).await,
            Err(ApiError::Conflict(_))
        ));
        assert_eq!(repo.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order() {
        let repo = InMemoryRepository::<Named>::new();
        for name in ["c", "a", "b"] {
            repo.insert(named(name)).await.unwrap();
        }

        let names: Vec<_> = repo.list().await.into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
