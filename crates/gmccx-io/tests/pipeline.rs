use std::fs;
use std::sync::Arc;

use gmccx_io::{
    CodecError, Deck, DeckSummary, MesherParams, ResultSelection, StepSettings, read_mesh,
    read_results, write_deck, write_geo,
};
use gmccx_model::{
    Bar, ElementFamily, FileType, LineSegment, Load, LoadBinding, Material, Model, Panel, Point,
    Profile, Support, SupportGeometry, SupportType, Surface, Vector,
};
use tempfile::TempDir;

const FRAME_MESH: &str = "\
*Heading
 frame_Mesh.inp
*NODE
1, 0, 0, 0
2, 1, 0, 0
3, 1, 1, 0
4, 0, 1, 0
5, 0.5, 0, 0
******* E L E M E N T S *************
*ELEMENT, type=T3D2, ELSET=Line1
1, 1, 5
2, 5, 2
*ELEMENT, type=CPS4, ELSET=Surface1
3, 1, 2, 3, 4
*ELSET,ELSET=PhysicalLine1
1, 2,
*ELSET,ELSET=PhysicalSurface1
3,
";

fn steel() -> Arc<Material> {
    Arc::new(Material::isotropic("Steel", 210e9, 0.3, 7860.0))
}

fn unit_square() -> Surface {
    Surface::polygon(vec![
        Point::new(0.0, 0.0, 0.0),
        Point::new(1.0, 0.0, 0.0),
        Point::new(1.0, 1.0, 0.0),
        Point::new(0.0, 1.0, 0.0),
    ])
    .unwrap()
}

/// A bar along the panel's lower edge, meshed and loaded.
fn meshed_frame(dir: &TempDir) -> Model {
    let mut model = Model::new("frame", dir.path(), 1e-3);
    let line = LineSegment::new(Point::new(0.0, 0.0, 0.0), Point::new(1.0, 0.0, 0.0));
    let profile = Profile::rectangular(0.2, 0.1).unwrap();
    model.add_bar(Bar::new(line, profile, steel(), 0.0, [0.0; 2]).unwrap()).unwrap();
    model
        .add_panel(Panel::new(unit_square(), 0.01, steel(), ElementFamily::Shell).unwrap())
        .unwrap();

    fs::write(model.paths().mesh_file(), FRAME_MESH).unwrap();
    read_mesh(&mut model, true).unwrap();

    let corner = model
        .add_load(Load::NodalForce {
            point: Point::new(1.0, 1.0, 0.0),
            force: Vector::new(0.0, 0.0, -1000.0),
        })
        .unwrap();
    assert_eq!(corner, LoadBinding::Node(2));
    model
        .add_load(Load::Gravity {
            acceleration: Vector::new(0.0, 0.0, -9.81),
        })
        .unwrap();
    model.add_support(Support::new(
        "base",
        vec![SupportGeometry::Point(Point::new(0.0, 0.0, 0.0))],
        SupportType::fixed(),
    ));
    model
}

fn displacement_rows(time: &str) -> String {
    let mut text = format!(" displacements (vx,vy,vz) for set NALL and time  {time}\n\n");
    for node in 1..=5 {
        text.push_str(&format!(
            "{node:>10}  0.000000E+00  0.000000E+00 -{node}.000000E-03\n"
        ));
    }
    text.push('\n');
    text
}

fn statistics(time: &str) -> String {
    let mut text = String::new();
    for (surface, force) in [("S1S", "1 0 0"), ("S1E", "1 0 0"), ("S2S", "2 0 0"), ("S2E", "2 0 0")] {
        let mut lines = vec![String::new(); 20];
        lines[0] = format!(" statistics for surface {surface} and time  {time}");
        lines[4] = format!("  {force}");
        lines[12] = "  0 0 0".to_string();
        text.push_str(&(lines.join("\n") + "\n"));
    }
    text
}

fn frd(time: &str) -> String {
    let mut lines = vec![
        "    2C                   5                                     1".to_string(),
        "    3C                   3                                     1".to_string(),
        " -1         3   10    0    1".to_string(),
        " -2       101       102       103       104       105       106       107       108"
            .to_string(),
        " -3".to_string(),
    ];
    for keyword in ["STRESS", "TOSTRAIN"] {
        lines.push(format!("  100CL  101 {time}           8                     0    1           1"));
        lines.push(format!(" -4  {keyword:<8}    6    1"));
        for node in 101..=108 {
            let mut row = format!(" -1{node:>10}");
            for value in ["1.00000E+06", "2.00000E+06", "0.00000E+00", "5.00000E+05", "0.0", "0.0"] {
                row.push_str(&format!("{value:>12}"));
            }
            lines.push(row);
        }
        lines.push(" -3".to_string());
    }
    lines.join("\n") + "\n"
}

#[test]
fn writes_mesher_script_next_to_model() {
    let dir = TempDir::new().unwrap();
    let model = Model::new("tower", dir.path(), 0.01);
    let path = write_geo(&model, &MesherParams::default()).unwrap();
    assert_eq!(path, dir.path().join("tower.geo"));

    let script = fs::read_to_string(path).unwrap();
    assert!(script.starts_with("SetFactory(\"OpenCASCADE\");\nGeometry.Tolerance=0.01;\n"));
    assert!(script.contains("Merge \"tower_Curves.iges\";"));
    assert!(script.ends_with("Mesh.SurfaceFaces = 1;\n"));
}

#[test]
fn written_deck_reads_back_as_cards() {
    let dir = TempDir::new().unwrap();
    let model = meshed_frame(&dir);
    let path = write_deck(&model, &StepSettings::default()).unwrap();
    assert_eq!(path, model.paths().file(FileType::Inp));

    let deck = Deck::parse_file(&path).unwrap();
    let summary = DeckSummary::from_deck(&deck);
    assert_eq!(summary.node_rows, 5);
    assert_eq!(summary.element_rows.get("B31R"), Some(&2));
    assert_eq!(summary.element_rows.get("S4R"), Some(&1));
    assert_eq!(summary.materials, vec!["Steel".to_string()]);
    assert_eq!((summary.beam_sections, summary.shell_sections), (1, 1));
    assert_eq!(summary.boundary_rows, 6);
    assert!(summary.has_step && summary.has_static && !summary.nonlinear);

    let cload = deck.cards_named("CLOAD").next().unwrap();
    assert_eq!(cload.data_lines, vec!["3,3,-1000"]);
    let dload = deck.cards_named("DLOAD").next().unwrap();
    assert_eq!(dload.data_lines.len(), 1);
    assert!(dload.data_lines[0].starts_with("Eall, GRAV,"));
    assert!(dload.data_lines[0].ends_with(",0,0,-1"));
}

#[test]
fn pipe_section_card_round_trips() {
    let dir = TempDir::new().unwrap();
    let mut model = Model::new("pipe", dir.path(), 1e-3);
    let line = LineSegment::new(Point::new(0.0, 0.0, 0.0), Point::new(0.0, 0.0, 3.0));
    let profile = Profile::pipe(100.0, 5.0).unwrap();
    model.add_bar(Bar::new(line, profile, steel(), 0.0, [0.0; 2]).unwrap()).unwrap();
    fs::write(
        model.paths().mesh_file(),
        "*NODE\n1,0,0,0\n2,0,0,1.5\n3,0,0,3\n*ELEMENT, type=T3D3, ELSET=Line1\n1,1,2,3\n*ELSET,ELSET=PhysicalLine1\n1\n",
    )
    .unwrap();
    read_mesh(&mut model, false).unwrap();

    let deck = Deck::parse_file(write_deck(&model, &StepSettings::default()).unwrap()).unwrap();
    let section = deck.cards_named("BEAM GENERAL SECTION").next().unwrap();
    assert_eq!(section.parameter("SECTION"), Some("PIPE"));
    assert_eq!(section.parameter("ELSET"), Some("BAR1"));
    assert_eq!(section.data_lines[0], "50,5");
}

#[test]
fn reads_a_finished_analysis() {
    let dir = TempDir::new().unwrap();
    let mut model = meshed_frame(&dir);
    let time = "0.1000000E+01";
    fs::write(model.paths().file(FileType::Dat), displacement_rows(time) + &statistics(time)).unwrap();
    fs::write(model.paths().file(FileType::Frd), frd("1.000000000")).unwrap();

    read_results(&mut model, &ResultSelection::default()).unwrap();

    assert_eq!(model.mesh().node(4).unwrap().displacement.z, -5e-3);
    let beam = model.mesh().element(1).unwrap().results();
    assert_eq!(beam.get("Fx").map(|v| v.len()), Some(2));
    let plate = model.mesh().element(2).unwrap().results();
    assert_eq!(plate.get("Syy").unwrap(), &[2.0e6; 8]);
    assert_eq!(plate.get("Exy").unwrap(), &[5.0e5; 8]);
}

#[test]
fn unconverged_analysis_leaves_model_untouched() {
    let dir = TempDir::new().unwrap();
    let mut model = meshed_frame(&dir);
    let time = "0.4000000E+00";
    fs::write(model.paths().file(FileType::Dat), displacement_rows(time) + &statistics(time)).unwrap();
    fs::write(model.paths().file(FileType::Frd), frd("0.400000000")).unwrap();

    let err = read_results(&mut model, &ResultSelection::default()).unwrap_err();
    assert!(matches!(err, CodecError::Convergence { found, .. } if (found - 0.4).abs() < 1e-12));
    assert!(model.mesh().nodes.iter().all(|n| n.displacement == Vector::zeros()));
    assert!(model.mesh().elements.iter().all(|e| e.results().is_empty()));
}

#[test]
fn missing_result_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let mut model = meshed_frame(&dir);
    let err = read_results(&mut model, &ResultSelection::default()).unwrap_err();
    assert!(matches!(err, CodecError::Io(_)));
}
