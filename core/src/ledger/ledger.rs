use std::collections::HashSet;
use std::sync::Arc;

use crate::error::LedgerError;
use crate::learning::types::{Method, MethodPatch, MethodStatus};

use super::store::{EvolutionEdge, MethodStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBump {
    Major,
    Minor,
    Patch,
}

/// Bump a `major.minor.patch` version (an optional leading `v` is accepted).
pub fn bump_version(version: &str, bump: VersionBump) -> Result<String, LedgerError> {
    let invalid = || LedgerError::InvalidEvolution(format!("'{version}' is not a major.minor.patch version"));

    let trimmed = version.trim().trim_start_matches('v');
    let parts: Vec<u64> = trimmed
        .split('.')
        .map(|p| p.parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|_| invalid())?;
    let [major, minor, patch] = parts[..] else {
        return Err(invalid());
    };

    Ok(match bump {
        VersionBump::Major => format!("{}.0.0", major + 1),
        VersionBump::Minor => format!("{major}.{}.0", minor + 1),
        VersionBump::Patch => format!("{major}.{minor}.{}", patch + 1),
    })
}

/// Versioned method history on top of a [`MethodStore`].
///
/// Methods are never rewritten: a refinement is stored as a new method linked to its
/// predecessor, and the predecessor only changes status.
#[derive(Clone)]
pub struct MethodLedger {
    store: Arc<dyn MethodStore>,
}

impl MethodLedger {
    pub fn new(store: Arc<dyn MethodStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn MethodStore> {
        &self.store
    }

    /// Store `new_method` as the successor of `old_id`.
    ///
    /// The predecessor is marked superseded only if it is still active.
    pub async fn evolve(
        &self,
        old_id: &str,
        new_method: Method,
        reason: &str,
    ) -> Result<Method, LedgerError> {
        if new_method.id == old_id {
            return Err(LedgerError::InvalidEvolution(format!(
                "method '{old_id}' cannot evolve from itself"
            )));
        }

        let predecessor = self.store.get_method(old_id).await?;
        match self.store.get_method(&new_method.id).await {
            Ok(_) => {
                return Err(LedgerError::InvalidEvolution(format!(
                    "method '{}' is already stored",
                    new_method.id
                )))
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        self.store.create_method(&new_method).await?;
        self.store
            .add_evolution(&EvolutionEdge::new(old_id, &new_method.id, reason))
            .await?;

        if predecessor.is_active() {
            self.store
                .update_method(old_id, &MethodPatch::status(MethodStatus::Superseded))
                .await?;
        }

        tracing::info!(
            method_id = %new_method.id,
            evolved_from = %old_id,
            version = %new_method.version,
            %reason,
            "method evolved"
        );
        Ok(new_method)
    }

    /// Deprecate an active method. Inactive methods are returned unchanged.
    pub async fn retire(&self, id: &str, reason: &str) -> Result<Method, LedgerError> {
        let method = self.store.get_method(id).await?;
        if !method.is_active() {
            tracing::debug!(method_id = %id, status = ?method.status, "retire skipped, method not active");
            return Ok(method);
        }
        let retired = self
            .store
            .update_method(id, &MethodPatch::status(MethodStatus::Deprecated))
            .await?;
        tracing::info!(method_id = %id, %reason, "method retired");
        Ok(retired)
    }

    /// Every ancestor of `id`, nearest first.
    pub async fn predecessors(&self, id: &str) -> Result<Vec<EvolutionEdge>, LedgerError> {
        self.walk(id, Direction::Back).await
    }

    /// Every descendant of `id`, nearest first.
    pub async fn successors(&self, id: &str) -> Result<Vec<EvolutionEdge>, LedgerError> {
        self.walk(id, Direction::Forward).await
    }

    /// Method ids from the oldest ancestor to the newest descendant of `id`, following
    /// the first edge found at each step.
    pub async fn lineage(&self, id: &str) -> Result<Vec<String>, LedgerError> {
        // Fails early on unknown ids.
        self.store.get_method(id).await?;

        let mut seen = HashSet::from([id.to_string()]);
        let mut back = Vec::new();
        let mut current = id.to_string();
        while let Some(edge) = self.store.predecessors(&current).await?.into_iter().next() {
            if !seen.insert(edge.predecessor_id.clone()) {
                break;
            }
            back.push(edge.predecessor_id.clone());
            current = edge.predecessor_id;
        }

        let mut chain: Vec<String> = back.into_iter().rev().collect();
        chain.push(id.to_string());

        let mut current = id.to_string();
        while let Some(edge) = self.store.successors(&current).await?.into_iter().next() {
            if !seen.insert(edge.successor_id.clone()) {
                break;
            }
            chain.push(edge.successor_id.clone());
            current = edge.successor_id;
        }

        Ok(chain)
    }

    async fn walk(&self, id: &str, direction: Direction) -> Result<Vec<EvolutionEdge>, LedgerError> {
        let mut seen = HashSet::from([id.to_string()]);
        let mut frontier = vec![id.to_string()];
        let mut out = Vec::new();

        // Breadth-first so nearer generations come first.
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for node in frontier {
                let edges = match direction {
                    Direction::Back => self.store.predecessors(&node).await?,
                    Direction::Forward => self.store.successors(&node).await?,
                };
                for edge in edges {
                    let neighbour = match direction {
                        Direction::Back => edge.predecessor_id.clone(),
                        Direction::Forward => edge.successor_id.clone(),
                    };
                    if seen.insert(neighbour.clone()) {
                        next.push(neighbour);
                        out.push(edge);
                    }
                }
            }
            frontier = next;
        }

        Ok(out)
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Back,
    Forward,
}
