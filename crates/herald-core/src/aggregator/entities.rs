//! Entity references and the nested entity map returned by aggregators.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Entity type name -> entity id -> why the entity is included.
pub type EntityMap = BTreeMap<String, BTreeMap<String, Inclusion>>;

/// Why an entity is part of a plan.
///
/// Serializes untagged, so `true` is a direct inclusion and a nested map
/// names the entities that pulled this one in:
///
/// ```json
/// {"file": {"12": {"node": {"7": true}}}, "node": {"7": true}}
/// ```
///
/// Here `file/12` is included because `node/7` references it. Chains may
/// nest to any depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Inclusion {
    /// Included directly. `false` marks an entry that is present but
    /// excluded.
    Direct(bool),
    /// Included as a dependency of the entities in the map.
    Via(EntityMap),
}

/// A single entity, identified by type and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.id)
    }
}

/// Flatten an [`EntityMap`] into a list where every entity appears once and
/// precedes the entities that pulled it in.
///
/// Ties are broken by `(type, id)` order. Entities caught in a reference
/// cycle are appended in key order.
pub fn dependency_order(map: &EntityMap) -> Vec<EntityRef> {
    let mut nodes: BTreeSet<EntityRef> = BTreeSet::new();
    // dependency -> entities that must come after it
    let mut edges: BTreeMap<EntityRef, BTreeSet<EntityRef>> = BTreeMap::new();

    for (entity_type, ids) in map {
        for (id, inclusion) in ids {
            if matches!(inclusion, Inclusion::Direct(false)) {
                continue;
            }
            collect(EntityRef::new(entity_type, id), inclusion, &mut nodes, &mut edges);
        }
    }

    let mut in_degree: BTreeMap<&EntityRef, usize> = nodes.iter().map(|n| (n, 0)).collect();
    for dependents in edges.values() {
        for dependent in dependents {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree += 1;
            }
        }
    }

    let mut ready: BTreeSet<&EntityRef> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(node, _)| *node)
        .collect();
    let mut ordered: Vec<EntityRef> = Vec::with_capacity(nodes.len());
    let mut emitted: BTreeSet<&EntityRef> = BTreeSet::new();

    while let Some(node) = ready.pop_first() {
        ordered.push(node.clone());
        emitted.insert(node);
        if let Some(dependents) = edges.get(node) {
            for dependent in dependents {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }
    }

    for node in &nodes {
        if !emitted.contains(node) {
            ordered.push(node.clone());
        }
    }

    ordered
}

fn collect(
    entity: EntityRef,
    inclusion: &Inclusion,
    nodes: &mut BTreeSet<EntityRef>,
    edges: &mut BTreeMap<EntityRef, BTreeSet<EntityRef>>,
) {
    if let Inclusion::Via(referrers) = inclusion {
        for (entity_type, ids) in referrers {
            for (id, next) in ids {
                let referrer = EntityRef::new(entity_type, id);
                if referrer != entity {
                    edges
                        .entry(entity.clone())
                        .or_default()
                        .insert(referrer.clone());
                }
                // Chains are finite trees; follow every one.
                collect(referrer, next, nodes, edges);
            }
        }
    }
    nodes.insert(entity);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: serde_json::Value) -> EntityMap {
        serde_json::from_value(value).expect("valid entity map")
    }

    fn names(order: &[EntityRef]) -> Vec<String> {
        order.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn parses_direct_and_nested_leaves() {
        let m = map(json!({
            "node": {"7": true},
            "file": {"12": {"node": {"7": true}}}
        }));
        assert_eq!(m["node"]["7"], Inclusion::Direct(true));
        match &m["file"]["12"] {
            Inclusion::Via(chain) => assert_eq!(chain["node"]["7"], Inclusion::Direct(true)),
            other => panic!("expected nested inclusion, got {other:?}"),
        }
    }

    #[test]
    fn flat_map_is_key_ordered() {
        let m = map(json!({"node": {"2": true, "1": true}, "file": {"9": true}}));
        assert_eq!(names(&dependency_order(&m)), vec!["file/9", "node/1", "node/2"]);
    }

    #[test]
    fn dependency_precedes_the_entity_that_pulled_it_in() {
        // taxonomy_term/3 was pulled in by node/1; without the edge it would
        // sort after node/1.
        let m = map(json!({
            "node": {"1": true},
            "taxonomy_term": {"3": {"node": {"1": true}}}
        }));
        assert_eq!(names(&dependency_order(&m)), vec!["taxonomy_term/3", "node/1"]);
    }

    #[test]
    fn deep_chains_are_ordered_and_deduplicated() {
        // user/5 <- file/12 <- node/7
        let m = map(json!({
            "node": {"7": true},
            "file": {"12": {"node": {"7": true}}},
            "user": {"5": {"file": {"12": {"node": {"7": true}}}}}
        }));
        assert_eq!(names(&dependency_order(&m)), vec!["user/5", "file/12", "node/7"]);
    }

    #[test]
    fn referrers_only_named_in_chains_are_included() {
        let m = map(json!({"file": {"12": {"node": {"7": true}}}}));
        assert_eq!(names(&dependency_order(&m)), vec!["file/12", "node/7"]);
    }

    #[test]
    fn chains_under_an_already_seen_referrer_are_followed() {
        // a/1 is seen first as a direct entry; its longer chain under b/2
        // is the only place c/3 is named.
        let m = map(json!({
            "a": {"1": true},
            "b": {"2": {"a": {"1": {"c": {"3": true}}}}}
        }));
        assert_eq!(names(&dependency_order(&m)), vec!["b/2", "a/1", "c/3"]);
    }

    #[test]
    fn same_entity_in_repeated_chains_is_emitted_once() {
        let m = map(json!({
            "file": {
                "1": {"node": {"7": {"user": {"5": true}}}},
                "2": {"node": {"7": {"user": {"5": true}}}}
            }
        }));
        assert_eq!(
            names(&dependency_order(&m)),
            vec!["file/1", "file/2", "node/7", "user/5"]
        );
    }

    #[test]
    fn excluded_entries_are_skipped() {
        let m = map(json!({"node": {"1": true, "2": false}}));
        assert_eq!(names(&dependency_order(&m)), vec!["node/1"]);
    }

    #[test]
    fn cycles_fall_back_to_key_order() {
        let m = map(json!({
            "node": {
                "1": {"node": {"2": true}},
                "2": {"node": {"1": true}}
            }
        }));
        assert_eq!(names(&dependency_order(&m)), vec!["node/1", "node/2"]);
    }

    #[test]
    fn entity_ref_display() {
        assert_eq!(EntityRef::new("node", "42").to_string(), "node/42");
    }
}
