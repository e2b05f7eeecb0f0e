// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use petgraph::algo::kosaraju_scc;
use petgraph::graph::IndexType;
use petgraph::prelude::*;
use petgraph::visit::{IntoNeighborsDirected, IntoNodeIdentifiers, VisitMap, Visitable};

/// Strongly connected components of a graph.
#[derive(Clone, Debug)]
pub(crate) struct Sccs<Ix: IndexType> {
    sccs: Vec<Vec<NodeIndex<Ix>>>,
}

impl<Ix: IndexType> Sccs<Ix> {
    /// Creates a new instance from the provided graph.
    pub fn new<G>(graph: G) -> Self
    where
        G: IntoNeighborsDirected<NodeId = NodeIndex<Ix>> + Visitable + IntoNodeIdentifiers,
        <G as Visitable>::Map: VisitMap<NodeIndex<Ix>>,
    {
        // kosaraju_scc is iterative, so deep trigger chains can't overflow the stack.
        Self {
            sccs: kosaraju_scc(graph),
        }
    }

    /// Returns all the SCCs with more than one element.
    pub fn multi_sccs(&self) -> impl Iterator<Item = &[NodeIndex<Ix>]> {
        self.sccs.iter().filter_map(|scc| {
            if scc.len() > 1 {
                Some(scc.as_slice())
            } else {
                None
            }
        })
    }
}
