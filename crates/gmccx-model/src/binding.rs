//! Binding of loads and supports to mesh entities by geometric proximity.

use tracing::debug;

use crate::error::{ModelError, Result};
use crate::geometry::{Point, Vector};
use crate::loads::{InfillLoad, Load, Support, SupportGeometry};
use crate::mesh::{Element, Element2D, Mesh, Node};
use crate::store::Indexed;

/// What a load ended up attached to
#[derive(Debug, Clone, PartialEq)]
pub enum LoadBinding {
    /// Nodal load applied to this node
    Node(usize),
    /// Pressure contributions added to this many element/surface pairs
    Elements(usize),
    /// Added to the aggregate gravity
    Gravity,
    /// No node within tolerance; the load has no effect
    Unbound,
}

/// Closest primary node within `tolerance`; among equally close nodes the
/// first one in store order wins.
pub fn closest_primary_node(mesh: &Mesh, point: &Point, tolerance: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for node in mesh.nodes.iter().filter(|n| n.primary) {
        let dist = (node.location - point).norm();
        if dist > tolerance {
            continue;
        }
        if best.is_none_or(|(_, d)| dist < d) {
            best = node.id().map(|id| (id, dist));
        }
    }
    best.map(|(id, _)| id)
}

/// Apply a load to the mesh. Gravity accumulates into `gravity`.
pub fn bind_load(
    mesh: &mut Mesh,
    load: &Load,
    tolerance: f64,
    gravity: &mut Vector,
) -> Result<LoadBinding> {
    let binding = match load {
        Load::NodalForce { point, force } => bind_nodal(mesh, point, tolerance, |n| n.add_force(force)),
        Load::NodalMoment { point, axis, value } => {
            let moment = axis * *value;
            bind_nodal(mesh, point, tolerance, |n| n.add_moment(&moment))
        }
        Load::Pressure { surfaces, value } => {
            let mut hits = 0;
            for id in face_ids(mesh) {
                let vertices = face(mesh, id)?.vertices(&mesh.nodes)?;
                let matching = surfaces
                    .iter()
                    .filter(|s| vertices.iter().all(|v| s.distance_to(v) <= tolerance))
                    .count();
                if matching > 0 {
                    if let Some(e) = mesh.elements.get_mut(id).and_then(Element::as_face_mut) {
                        for _ in 0..matching {
                            e.add_pressure(*value);
                        }
                    }
                    hits += matching;
                }
            }
            LoadBinding::Elements(hits)
        }
        Load::Infill(infill) => LoadBinding::Elements(bind_infill(mesh, infill, tolerance)?),
        Load::Gravity { acceleration } => {
            *gravity += acceleration;
            LoadBinding::Gravity
        }
    };
    debug!(load = load.kind(), ?binding, "bound load");
    Ok(binding)
}

fn bind_nodal(
    mesh: &mut Mesh,
    point: &Point,
    tolerance: f64,
    apply: impl FnOnce(&mut Node),
) -> LoadBinding {
    match closest_primary_node(mesh, point, tolerance) {
        Some(id) => match mesh.nodes.get_mut(id) {
            Some(node) => {
                apply(node);
                LoadBinding::Node(id)
            }
            None => LoadBinding::Unbound,
        },
        None => LoadBinding::Unbound,
    }
}

fn face_ids(mesh: &Mesh) -> Vec<usize> {
    mesh.faces().map(|(id, _)| id).collect()
}

fn face(mesh: &Mesh, id: usize) -> Result<&Element2D> {
    mesh.element(id)?.as_face().ok_or(ModelError::NotFound {
        kind: "Element2D",
        id,
    })
}

/// Elements bounding an infill are oriented with their normal pointing into
/// the infill and receive the negated evaluated pressure. Elements with infill
/// on both sides are left alone.
fn bind_infill(mesh: &mut Mesh, load: &InfillLoad, tolerance: f64) -> Result<usize> {
    let mut hits = 0;
    for id in face_ids(mesh) {
        for infill in &load.infills {
            let element = face(mesh, id)?;
            let vertices = element.vertices(&mesh.nodes)?;
            let volume = infill.volume();
            let adjoining = vertices
                .iter()
                .all(|v| (volume.closest_point(v) - v).norm() <= tolerance);
            if !adjoining {
                continue;
            }

            let centroid = element.centroid(&mesh.nodes)?;
            let normal = element.normal(&mesh.nodes, true)?;
            let facing_infill = volume.contains(&(centroid + normal * tolerance));
            if facing_infill && volume.contains(&(centroid - normal * tolerance)) {
                debug!(element = id, "element enclosed by infill, skipped");
                continue;
            }

            let pressure = load.function.evaluate(&[
                ("g", load.density),
                ("x", infill.max_z() - centroid.z),
                ("z", infill.max_z() - infill.min_z()),
            ])?;

            if let Some(e) = mesh.elements.get_mut(id).and_then(Element::as_face_mut) {
                if !facing_infill {
                    e.flip_normal();
                }
                e.add_pressure(-pressure);
                hits += 1;
            }
        }
    }
    Ok(hits)
}

/// Collect the primary nodes a support acts on.
pub fn bind_support(mesh: &Mesh, support: &mut Support, tolerance: f64) {
    for geometry in &support.geometry {
        for node in mesh.nodes.iter().filter(|n| n.primary) {
            let target = match geometry {
                SupportGeometry::Point(p) => *p,
                SupportGeometry::Curve(c) => c.closest_point(&node.location),
                SupportGeometry::Surface(s) => s.closest_point(&node.location),
            };
            if (node.location - target).norm() <= tolerance {
                if let Some(id) = node.id() {
                    support.nodes.insert(id);
                }
            }
        }
    }

    if support.support_type.physical() {
        let base = support.nodes.clone();
        for (_, face) in mesh.faces() {
            let corners = face.primary_nodes();
            if corners.iter().any(|n| base.contains(n)) {
                support.nodes.extend(corners.iter().copied());
            }
        }
    }

    debug!(support = %support.name, nodes = support.nodes.len(), "bound support");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;
    use crate::geometry::{Polyline, Surface, Volume};
    use crate::loads::{Infill, SupportType};

    fn node(mesh: &mut Mesh, x: f64, y: f64, z: f64, primary: bool) -> usize {
        let mut n = Node::new(Point::new(x, y, z));
        n.primary = primary;
        mesh.add_node(n).unwrap()
    }

    /// Unit square in the plane z = `z`, normal +Z.
    fn square(z: f64) -> Mesh {
        let mut mesh = Mesh::new();
        let ids: Vec<_> = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
            .iter()
            .map(|&(x, y)| node(&mut mesh, x, y, z, true))
            .collect();
        mesh.add_element(Element2D::new(ids, 1, false).unwrap()).unwrap();
        mesh
    }

    fn pressure(mesh: &Mesh) -> f64 {
        mesh.element(0).unwrap().as_face().unwrap().pressure()
    }

    #[test]
    fn nodal_force_exact_location_zero_tolerance() {
        let mut mesh = square(0.0);
        let mut g = Vector::zeros();
        let load = Load::NodalForce {
            point: Point::new(1.0, 1.0, 0.0),
            force: Vector::new(0.0, 0.0, -5.0),
        };
        let binding = bind_load(&mut mesh, &load, 0.0, &mut g).unwrap();
        assert_eq!(binding, LoadBinding::Node(2));
        assert_eq!(mesh.node(2).unwrap().force, Vector::new(0.0, 0.0, -5.0));
    }

    #[test]
    fn nodal_force_out_of_tolerance_is_unbound() {
        let mut mesh = square(0.0);
        let mut g = Vector::zeros();
        let load = Load::NodalForce {
            point: Point::new(0.5, 0.5, 0.0),
            force: Vector::new(1.0, 0.0, 0.0),
        };
        let binding = bind_load(&mut mesh, &load, 0.1, &mut g).unwrap();
        assert_eq!(binding, LoadBinding::Unbound);
        assert!(mesh.nodes.iter().all(|n| n.force == Vector::zeros()));
    }

    #[test]
    fn closest_node_skips_secondary_and_keeps_first_tie() {
        let mut mesh = Mesh::new();
        node(&mut mesh, 0.0, 0.0, 0.0, false);
        let first = node(&mut mesh, 1.0, 0.0, 0.0, true);
        node(&mut mesh, -1.0, 0.0, 0.0, true);
        assert_eq!(closest_primary_node(&mesh, &Point::origin(), 1.0), Some(first));
        assert_eq!(closest_primary_node(&mesh, &Point::origin(), 0.5), None);
    }

    #[test]
    fn nodal_moment_scales_axis() {
        let mut mesh = square(0.0);
        let mut g = Vector::zeros();
        let load = Load::NodalMoment {
            point: Point::new(0.0, 0.0, 0.01),
            axis: Vector::new(0.0, 1.0, 0.0),
            value: 3.0,
        };
        bind_load(&mut mesh, &load, 0.05, &mut g).unwrap();
        assert_eq!(mesh.node(0).unwrap().moment, Vector::new(0.0, 3.0, 0.0));
    }

    #[test]
    fn pressure_applies_once_per_matching_surface() {
        let mut mesh = square(0.0);
        let mut g = Vector::zeros();
        let plate = Surface::polygon(vec![
            Point::new(-1.0, -1.0, 0.0),
            Point::new(2.0, -1.0, 0.0),
            Point::new(2.0, 2.0, 0.0),
            Point::new(-1.0, 2.0, 0.0),
        ])
        .unwrap();
        let far = Surface::polygon(vec![
            Point::new(0.0, 0.0, 5.0),
            Point::new(1.0, 0.0, 5.0),
            Point::new(1.0, 1.0, 5.0),
        ])
        .unwrap();
        let load = Load::Pressure {
            surfaces: vec![plate.clone(), plate, far],
            value: 2.0,
        };
        let binding = bind_load(&mut mesh, &load, 1e-6, &mut g).unwrap();
        assert_eq!(binding, LoadBinding::Elements(2));
        assert_eq!(pressure(&mesh), 4.0);
    }

    #[test]
    fn gravity_accumulates() {
        let mut mesh = Mesh::new();
        let mut g = Vector::new(1.0, 0.0, 0.0);
        let load = Load::Gravity {
            acceleration: Vector::new(0.0, 0.0, -9.81),
        };
        assert_eq!(bind_load(&mut mesh, &load, 0.0, &mut g).unwrap(), LoadBinding::Gravity);
        assert_eq!(g, Vector::new(1.0, 0.0, -9.81));
    }

    fn infill_load(volumes: Vec<Volume>) -> Load {
        Load::Infill(InfillLoad {
            infills: volumes.into_iter().map(Infill::new).collect(),
            density: 1000.0,
            function: Expression::parse("g*x").unwrap(),
        })
    }

    #[test]
    fn infill_sandwiched_element_is_skipped() {
        // Mid-height element of a tank; its corners touch the tank walls and
        // both offsets along the normal stay inside.
        let mut mesh = square(1.0);
        let mut g = Vector::zeros();
        let tank = Volume::cuboid(Point::new(0.0, 0.0, 0.0), Point::new(1.0, 1.0, 2.0)).unwrap();

        let binding = bind_load(&mut mesh, &infill_load(vec![tank]), 0.01, &mut g).unwrap();
        assert_eq!(binding, LoadBinding::Elements(0));
        assert_eq!(pressure(&mesh), 0.0);
        assert_eq!(mesh.element(0).unwrap().nodes(), &[0, 1, 2, 3]);
    }

    #[test]
    fn infill_keeps_element_facing_into_volume() {
        // Tank floor with normal +Z, pointing into the infill above it.
        let mut mesh = square(0.0);
        let mut g = Vector::zeros();
        let tank = Volume::cuboid(Point::new(0.0, 0.0, 0.0), Point::new(1.0, 1.0, 2.0)).unwrap();
        let binding = bind_load(&mut mesh, &infill_load(vec![tank]), 0.01, &mut g).unwrap();

        assert_eq!(binding, LoadBinding::Elements(1));
        let face = mesh.element(0).unwrap().as_face().unwrap();
        assert_eq!(face.nodes(), &[0, 1, 2, 3]);
        assert!((face.pressure() + 2000.0).abs() < 1e-9);
    }

    #[test]
    fn infill_flips_element_facing_away() {
        // Same floor wound the other way: normal -Z points out of the tank.
        let mut mesh = Mesh::new();
        let ids: Vec<_> = [(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)]
            .iter()
            .map(|&(x, y)| node(&mut mesh, x, y, 0.0, true))
            .collect();
        mesh.add_element(Element2D::new(ids, 1, false).unwrap()).unwrap();
        let mut g = Vector::zeros();
        let tank = Volume::cuboid(Point::new(0.0, 0.0, 0.0), Point::new(1.0, 1.0, 2.0)).unwrap();
        bind_load(&mut mesh, &infill_load(vec![tank]), 0.01, &mut g).unwrap();

        let face = mesh.element(0).unwrap().as_face().unwrap();
        assert_eq!(face.nodes(), &[3, 2, 1, 0]);
        assert!((face.pressure() + 2000.0).abs() < 1e-9);
    }

    #[test]
    fn infill_ignores_distant_elements() {
        let mut mesh = square(5.0);
        let mut g = Vector::zeros();
        let tank = Volume::cuboid(Point::new(0.0, 0.0, 0.0), Point::new(1.0, 1.0, 2.0)).unwrap();
        let binding = bind_load(&mut mesh, &infill_load(vec![tank]), 0.01, &mut g).unwrap();
        assert_eq!(binding, LoadBinding::Elements(0));
        assert_eq!(pressure(&mesh), 0.0);
    }

    #[test]
    fn physical_support_fixes_whole_face() {
        let mesh = square(0.0);
        let mut support = Support::new(
            "corner",
            vec![SupportGeometry::Point(Point::new(0.0, 0.0, 0.0))],
            SupportType::new([1, 2, 3], true).unwrap(),
        );
        bind_support(&mesh, &mut support, 1e-6);
        assert_eq!(support.nodes().iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);

        let mut plain = Support::new(
            "corner",
            vec![SupportGeometry::Point(Point::new(0.0, 0.0, 0.0))],
            SupportType::pinned(),
        );
        bind_support(&mesh, &mut plain, 1e-6);
        assert_eq!(plain.nodes().iter().copied().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn curve_support_binds_nodes_along_edge() {
        let mesh = square(0.0);
        let edge = Polyline::new(vec![
            Point::new(-1.0, 0.0, 0.0),
            Point::new(2.0, 0.0, 0.0),
        ])
        .unwrap();
        let mut support = Support::new("edge", vec![SupportGeometry::Curve(edge)], SupportType::fixed());
        bind_support(&mesh, &mut support, 1e-6);
        assert_eq!(support.nodes().iter().copied().collect::<Vec<_>>(), vec![0, 1]);
    }
}
