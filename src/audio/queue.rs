use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use crate::sources::StreamSource;

#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub stream: StreamSource,
    pub title: String,
    pub requested_by: UserId,
    pub source_url: Option<String>,
    pub duration: Option<Duration>,
    pub added_at: DateTime<Utc>,
}

/// Cola FIFO de un servidor con su ranura de "reproduciendo ahora"
#[derive(Debug, Default)]
pub struct GuildQueue {
    items: VecDeque<QueueEntry>,
    current: Option<QueueEntry>,
}

impl GuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un track al final de la cola
    pub fn enqueue(&mut self, entry: QueueEntry) {
        info!("➕ Agregado a la cola: {}", entry.title);
        self.items.push_back(entry);
    }

    /// Obtiene el siguiente track (FIFO - First In, First Out).
    ///
    /// The head moves into the now-playing slot, replacing whatever was
    /// there. An empty queue clears the slot.
    pub fn dequeue_next(&mut self) -> Option<QueueEntry> {
        self.current = self.items.pop_front();

        match &self.current {
            Some(item) => info!("➡️ Siguiente en cola (FIFO): {}", item.title),
            None => info!("📭 Cola vacía, no hay siguiente track"),
        }

        self.current.clone()
    }

    /// Track actual sin modificar la cola
    pub fn peek_current(&self) -> Option<&QueueEntry> {
        self.current.as_ref()
    }

    /// Limpia la cola y el track actual
    pub fn clear(&mut self) {
        let dropped = self.items.len();
        self.items.clear();
        self.current = None;
        debug!("🗑️ Cola limpiada ({} pendientes descartadas)", dropped);
    }

    /// Número de tracks pendientes (sin contar el actual)
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &QueueEntry> {
        self.items.iter()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn entry(title: &str) -> QueueEntry {
        QueueEntry {
            stream: StreamSource::Direct(format!("https://cdn.example/{}.m4a", title)),
            title: title.to_string(),
            requested_by: UserId::new(1),
            source_url: None,
            duration: None,
            added_at: Utc::now(),
        }
    }

    fn titles(queue: &GuildQueue) -> Vec<String> {
        queue.pending().map(|e| e.title.clone()).collect()
    }

    #[test]
    fn test_dequeue_is_fifo() {
        let mut queue = GuildQueue::new();
        queue.enqueue(entry("a"));
        queue.enqueue(entry("b"));
        queue.enqueue(entry("c"));

        assert_eq!(queue.dequeue_next().map(|e| e.title), Some("a".to_string()));
        assert_eq!(queue.dequeue_next().map(|e| e.title), Some("b".to_string()));
        assert_eq!(titles(&queue), vec!["c".to_string()]);
    }

    #[test]
    fn test_dequeue_moves_head_into_current() {
        let mut queue = GuildQueue::new();
        assert!(queue.peek_current().is_none());

        queue.enqueue(entry("a"));
        queue.dequeue_next();

        assert_eq!(queue.peek_current().map(|e| e.title.as_str()), Some("a"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dequeue_on_empty_clears_current() {
        let mut queue = GuildQueue::new();
        queue.enqueue(entry("a"));
        queue.dequeue_next();

        assert_eq!(queue.dequeue_next(), None);
        assert!(queue.peek_current().is_none());
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut queue = GuildQueue::new();
        queue.enqueue(entry("a"));
        queue.enqueue(entry("b"));
        queue.dequeue_next();

        queue.clear();

        assert_eq!(queue.len(), 0);
        assert!(queue.peek_current().is_none());
    }
}
