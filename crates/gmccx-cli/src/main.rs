mod project;
mod report;

use std::process::ExitCode;

use gmccx_io::{
    Deck, DeckSummary, ResultSelection, read_mesh, read_results, write_deck, write_geo,
};
use gmccx_model::Model;
use tracing::info;
use tracing_subscriber::EnvFilter;

use project::Project;
use report::ResultsReport;

fn usage() {
    eprintln!("usage: gmccx geo <project.json>");
    eprintln!("       gmccx deck <project.json>");
    eprintln!("       gmccx results <project.json> [--step <n>]");
    eprintln!("       gmccx inspect <deck.inp>");
}

/// Components plus the imported mesh with loads and supports bound to it.
fn meshed_model(project: &Project) -> Result<Model, Box<dyn std::error::Error>> {
    let mut model = project.build_model()?;
    let import = read_mesh(&mut model, project.reduced_integration)?;
    info!(nodes = import.nodes, elements = import.elements, "mesh ready");
    project.apply_boundary_conditions(&mut model)?;
    Ok(model)
}

fn run_geo(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let project = Project::load(path)?;
    let model = project.build_model()?;
    let script = write_geo(&model, &project.mesher)?;
    println!("{}", script.display());
    Ok(())
}

fn run_deck(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let project = Project::load(path)?;
    let model = meshed_model(&project)?;
    let deck = write_deck(&model, &project.step)?;
    eprint!("{}", model.mesh().statistics().format());
    for load in model.unbound_loads() {
        eprintln!("warning: {} load not applied", load.kind());
    }
    println!("{}", deck.display());
    Ok(())
}

fn run_results(path: &str, step: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let project = Project::load(path)?;
    let mut model = meshed_model(&project)?;
    let selection = ResultSelection {
        step,
        ..ResultSelection::from(&project.step)
    };
    read_results(&mut model, &selection)?;
    let report = ResultsReport::from_model(&model);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_inspect(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let deck = Deck::parse_file(path)?;
    let summary = DeckSummary::from_deck(&deck);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn parse_step(args: &[String]) -> Option<Option<usize>> {
    match args {
        [] => Some(None),
        [flag, n] if flag == "--step" => n.parse().ok().map(Some),
        _ => None,
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        usage();
        return ExitCode::from(2);
    }

    let path = args[2].as_str();
    let outcome = match (args[1].as_str(), &args[3..]) {
        ("geo", []) => run_geo(path),
        ("deck", []) => run_deck(path),
        ("results", rest) => match parse_step(rest) {
            Some(step) => run_results(path, step),
            None => {
                usage();
                return ExitCode::from(2);
            }
        },
        ("inspect", []) => run_inspect(path),
        _ => {
            usage();
            return ExitCode::from(2);
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_step;

    #[test]
    fn step_flag_is_optional() {
        assert_eq!(parse_step(&[]), Some(None));
        assert_eq!(parse_step(&["--step".into(), "2".into()]), Some(Some(2)));
        assert_eq!(parse_step(&["--step".into(), "x".into()]), None);
        assert_eq!(parse_step(&["2".into()]), None);
    }
}
