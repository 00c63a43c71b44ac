//! Post-run reporting (spec §6): the per-node `{id, pdr, ar, cr, mr, energy,
//! hops, x, y}` summary an external driver persists or plots. The kernel
//! never calls into this module itself; it is the optional, explicitly
//! invoked surface spec §1 carves out for a driver.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

use crate::node::{Node, NodeId};

/// One CSV row: delivery/attempt/collision/miss ratios, energy, and hop
/// count to the gateway. Ratios are `0.0` rather than a division-by-zero
/// panic when their denominator is zero (a node that never generated
/// traffic, or one whose every attempt collided).
#[derive(Debug, Clone, Copy)]
pub struct NodeReport {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    /// `arr / pkts`.
    pub pdr: f64,
    /// `atte / pkts`.
    pub ar: f64,
    /// `coll / (pkts - atte)`.
    pub cr: f64,
    /// `miss / (pkts - atte)`.
    pub mr: f64,
    pub energy: f64,
    /// Hop count to the gateway, or `None` if this node has no route there
    /// yet (unjoined, or no DSDV entry for destination 0).
    pub hops: Option<u32>,
}

fn safe_div(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Walk a tree-protocol node's `parent` chain up to the gateway, since its
/// `RoutingTable::next` map (the DSDV representation) is empty for variant 3.
fn hops_via_parent_chain(nodes: &[Node], start: NodeId) -> Option<u32> {
    if start == 0 {
        return Some(0);
    }
    let mut current = start;
    let mut visited = HashSet::new();
    visited.insert(current);
    for hop in 1..=nodes.len() as u32 {
        let next = nodes[current as usize].routing.parent?;
        if next == 0 {
            return Some(hop);
        }
        if !visited.insert(next) {
            return None; // loop
        }
        current = next;
    }
    None
}

fn hops_for(nodes: &[Node], id: NodeId) -> Option<u32> {
    crate::routing::hops_to(nodes, id, 0).or_else(|| hops_via_parent_chain(nodes, id))
}

fn compute(nodes: &[Node], id: NodeId) -> NodeReport {
    let node = &nodes[id as usize];
    let s = node.stats;
    let attempted = s.pkts.saturating_sub(s.atte);

    NodeReport {
        id: node.id,
        x: node.position.x,
        y: node.position.y,
        pdr: if node.id == 0 { 0.0 } else { safe_div(s.arr, s.pkts) },
        ar: if node.id == 0 { 0.0 } else { safe_div(s.atte, s.pkts) },
        cr: if node.id == 0 { 0.0 } else { safe_div(s.coll, attempted) },
        mr: if node.id == 0 { 0.0 } else { safe_div(s.miss, attempted) },
        energy: s.energy,
        hops: if node.id == 0 { Some(0) } else { hops_for(nodes, node.id) },
    }
}

pub fn compute_all(nodes: &[Node]) -> Vec<NodeReport> {
    (0..nodes.len() as NodeId).map(|id| compute(nodes, id)).collect()
}

fn render_csv(reports: &[NodeReport]) -> String {
    let mut out = String::new();
    writeln!(out, "id,pdr,ar,cr,mr,energy,hops,x,y").expect("writing to a String never fails");
    for r in reports {
        writeln!(
            out,
            "{},{:.4},{:.4},{:.4},{:.4},{:.3},{},{},{}",
            r.id,
            r.pdr,
            r.ar,
            r.cr,
            r.mr,
            r.energy,
            r.hops.map(|h| h.to_string()).unwrap_or_default(),
            r.x,
            r.y
        )
        .expect("writing to a String never fails");
    }
    out
}

/// Persist a report as CSV, the one piece of disk I/O in this crate and
/// never called by the kernel itself.
pub fn write_csv(path: impl AsRef<Path>, reports: &[NodeReport]) -> std::io::Result<()> {
    std::fs::write(path, render_csv(reports))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, Point};

    #[test]
    fn node_with_no_traffic_reports_zero_ratios() {
        let nodes = vec![Node::new(0, Point::default()), Node::new(1, Point::default())];
        let reports = compute_all(&nodes);
        assert_eq!(reports[1].pdr, 0.0);
        assert_eq!(reports[1].ar, 0.0);
    }

    #[test]
    fn gateway_row_is_all_zero_except_position_and_energy() {
        let nodes = vec![Node::new(0, Point { x: 1.0, y: 2.0 })];
        let reports = compute_all(&nodes);
        assert_eq!(reports[0].pdr, 0.0);
        assert_eq!(reports[0].hops, Some(0));
        assert_eq!((reports[0].x, reports[0].y), (1.0, 2.0));
    }

    #[test]
    fn csv_has_header_and_one_row_per_node() {
        let nodes = vec![Node::new(0, Point::default()), Node::new(1, Point::default())];
        let csv = render_csv(&compute_all(&nodes));
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn hops_follows_dsdv_next_hop_chain_to_the_gateway() {
        let mut nodes = vec![Node::new(0, Point::default()), Node::new(1, Point::default())];
        nodes[1].routing.set_route(0, 0, 1, 0);
        let reports = compute_all(&nodes);
        assert_eq!(reports[1].hops, Some(1));
    }

    #[test]
    fn hops_falls_back_to_the_tree_parent_chain() {
        let mut nodes = vec![
            Node::new(0, Point::default()),
            Node::new(1, Point::default()),
            Node::new(2, Point::default()),
        ];
        nodes[1].routing.parent = Some(0);
        nodes[2].routing.parent = Some(1);
        let reports = compute_all(&nodes);
        assert_eq!(reports[1].hops, Some(1));
        assert_eq!(reports[2].hops, Some(2));
    }
}
