//! Summary of imported results, printed as JSON.

use std::collections::BTreeMap;

use gmccx_model::{Indexed, Model};
use serde::Serialize;

/// Largest magnitude of a value and where it occurs
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    /// Solver id of the node or element
    pub id: usize,
    pub value: f64,
}

impl Peak {
    fn update(slot: &mut Option<Peak>, id: usize, value: f64) {
        if slot.is_none_or(|p| value.abs() > p.value.abs()) {
            *slot = Some(Peak { id, value });
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsReport {
    pub model: String,
    pub nodes: usize,
    pub elements: usize,
    pub unbound_loads: usize,
    pub max_displacement: Option<Peak>,
    /// Peak per element result channel
    pub channels: BTreeMap<String, Peak>,
}

impl ResultsReport {
    pub fn from_model(model: &Model) -> Self {
        let mesh = model.mesh();

        let mut max_displacement = None;
        for node in &mesh.nodes {
            if let Some(id) = node.id() {
                Peak::update(&mut max_displacement, id + 1, node.displacement.norm());
            }
        }

        let mut peaks: BTreeMap<String, Option<Peak>> = BTreeMap::new();
        for element in &mesh.elements {
            let Some(id) = element.id() else { continue };
            let results = element.results();
            for name in results.names() {
                let slot = peaks.entry(name.to_string()).or_default();
                for value in results.get(name).unwrap_or_default() {
                    Peak::update(slot, id + 1, *value);
                }
            }
        }

        Self {
            model: model.name().to_string(),
            nodes: mesh.nodes.len(),
            elements: mesh.elements.len(),
            unbound_loads: model.unbound_loads().count(),
            max_displacement,
            channels: peaks
                .into_iter()
                .filter_map(|(name, peak)| peak.map(|p| (name, p)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use gmccx_model::{Element1D, Node, Point, Vector};

    use super::*;

    #[test]
    fn peaks_use_solver_ids_and_magnitude() {
        let mut model = Model::new("beam", "/tmp", 1e-3);
        let mesh = model.mesh_mut();
        mesh.add_node(Node::new(Point::new(0.0, 0.0, 0.0))).unwrap();
        mesh.add_node(Node::new(Point::new(1.0, 0.0, 0.0))).unwrap();
        mesh.add_element(Element1D::new(vec![0, 1], 1, false).unwrap()).unwrap();
        mesh.nodes.get_mut(1).unwrap().displacement = Vector::new(0.0, 3.0, -4.0);
        mesh.element_mut(0)
            .unwrap()
            .results_mut()
            .store("Fx", &[2.0, -7.5])
            .unwrap();

        let report = ResultsReport::from_model(&model);
        assert_eq!(report.nodes, 2);
        assert_eq!(report.max_displacement, Some(Peak { id: 2, value: 5.0 }));
        assert_eq!(report.channels["Fx"], Peak { id: 1, value: -7.5 });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["channels"]["Fx"]["value"], -7.5);
    }
}
