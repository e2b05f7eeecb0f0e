// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    db::BotDatabase,
    petgraph_support::{externals, scc::Sccs},
    BuilderId, Error,
};
use log::debug;
use petgraph::{prelude::*, visit::Dfs};
use std::collections::{BTreeSet, HashMap};

/// Index type for nodes in the trigger graph.
pub(crate) type BuilderIx = u32;

/// The trigger graph: an edge from each parent builder to every builder it triggers.
///
/// Every builder in the database is a node, possibly without children. A parent that is named by
/// a spec but has no spec of its own is also a node; see [`dangling_parents`](Self::dangling_parents).
///
/// The graph is guaranteed to be acyclic: [`create`](Self::create) rejects cycles.
#[derive(Clone, Debug)]
pub struct BotGraph {
    graph: Graph<BuilderId, (), Directed, BuilderIx>,
    ix_map: HashMap<BuilderId, NodeIndex<BuilderIx>>,
    dangling: Vec<(BuilderId, BuilderId)>,
}

impl BotGraph {
    /// Builds the trigger graph by inverting each spec's parent pointer.
    ///
    /// Returns [`Error::TriggerCycle`] if builders trigger each other in a cycle.
    pub fn create(db: &BotDatabase) -> Result<Self, Error> {
        let mut graph = Graph::with_capacity(db.len(), db.len());
        let mut ix_map = HashMap::with_capacity(db.len());
        for (builder_id, _) in db.iter() {
            let ix = graph.add_node(builder_id.clone());
            ix_map.insert(builder_id.clone(), ix);
        }

        let mut dangling = Vec::new();
        for (builder_id, spec) in db.iter() {
            let parent_id = match spec.parent_id(builder_id) {
                Some(parent_id) => parent_id,
                None => continue,
            };
            let parent_ix = match ix_map.get(&parent_id) {
                Some(&ix) => ix,
                None => {
                    dangling.push((builder_id.clone(), parent_id.clone()));
                    let ix = graph.add_node(parent_id.clone());
                    ix_map.insert(parent_id, ix);
                    ix
                }
            };
            graph.add_edge(parent_ix, ix_map[builder_id], ());
        }

        let bot_graph = Self {
            graph,
            ix_map,
            dangling,
        };
        bot_graph.check_acyclic()?;
        debug!(
            "built bot graph: {} nodes, {} edges",
            bot_graph.graph.node_count(),
            bot_graph.graph.edge_count()
        );
        Ok(bot_graph)
    }

    /// Returns true if this builder is a node in the graph.
    pub fn contains(&self, builder_id: &BuilderId) -> bool {
        self.ix_map.contains_key(builder_id)
    }

    /// Returns the number of builders in the graph, including dangling parents.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns true if the graph has no builders.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns the builders triggered directly by `builder_id`.
    ///
    /// Returns an error if the builder isn't in the graph.
    pub fn children(&self, builder_id: &BuilderId) -> Result<BTreeSet<&BuilderId>, Error> {
        let ix = self.builder_ix(builder_id)?;
        Ok(self
            .graph
            .neighbors_directed(ix, Outgoing)
            .map(|child_ix| &self.graph[child_ix])
            .collect())
    }

    /// Returns the builder that triggers `builder_id`, if any.
    pub fn parent(&self, builder_id: &BuilderId) -> Result<Option<&BuilderId>, Error> {
        let ix = self.builder_ix(builder_id)?;
        Ok(self
            .graph
            .neighbors_directed(ix, Incoming)
            .next()
            .map(|parent_ix| &self.graph[parent_ix]))
    }

    /// Returns the builders that are not triggered by any other builder, ordered by ID.
    pub fn roots(&self) -> BTreeSet<&BuilderId> {
        let ixs: Vec<_> = externals(&self.graph);
        ixs.into_iter().map(|ix| &self.graph[ix]).collect()
    }

    /// Returns `(child, parent)` pairs where the parent has no spec in the database.
    pub fn dangling_parents(&self) -> &[(BuilderId, BuilderId)] {
        &self.dangling
    }

    /// Returns every builder reachable from `roots`, including the roots themselves.
    ///
    /// Roots that aren't in the graph are returned as-is, with no descendants.
    pub fn transitive_closure<'a>(
        &self,
        roots: impl IntoIterator<Item = &'a BuilderId>,
    ) -> BTreeSet<BuilderId> {
        let mut closure = BTreeSet::new();
        let mut dfs = Dfs::empty(&self.graph);
        for root in roots {
            match self.ix_map.get(root) {
                Some(&ix) => {
                    dfs.move_to(ix);
                    while let Some(ix) = dfs.next(&self.graph) {
                        closure.insert(self.graph[ix].clone());
                    }
                }
                None => {
                    closure.insert(root.clone());
                }
            }
        }
        closure
    }

    // ---
    // Helper methods
    // ---

    fn builder_ix(&self, builder_id: &BuilderId) -> Result<NodeIndex<BuilderIx>, Error> {
        self.ix_map
            .get(builder_id)
            .copied()
            .ok_or_else(|| Error::UnknownBuilder(builder_id.clone()))
    }

    fn check_acyclic(&self) -> Result<(), Error> {
        if let Some(edge) = self
            .graph
            .edge_references()
            .find(|edge| edge.source() == edge.target())
        {
            return Err(Error::TriggerCycle(vec![self.graph[edge.source()].clone()]));
        }

        let sccs = Sccs::new(&self.graph);
        let first_cycle = sccs.multi_sccs().next();
        match first_cycle {
            Some(scc) => {
                let mut members: Vec<_> = scc.iter().map(|ix| self.graph[*ix].clone()).collect();
                members.sort();
                Err(Error::TriggerCycle(members))
            }
            None => Ok(()),
        }
    }
}
