// SPDX: CC0-1.0

use anyhow::Context;
use chrono::{DateTime, Local};
use core::num::NonZeroU32;
use fn_plot::{
    adapter::{AngleMode, CompiledExpr},
    config::Config,
    eval::{Ident, Idents},
    graph::{FunctionId, Graph, GraphError},
    render,
    session::Session,
    shell::{self, Command},
    stdlib,
    viewport::Viewport,
    worker::{self, Response, WorkerHandle},
    Number, PlotMode,
};
use log::{info, warn};
#[cfg(not(debug_assertions))]
use std::process::Stdio;
use std::{
    env,
    fs::{File, OpenOptions},
    io::{stdout, BufWriter, Write},
    path::PathBuf,
    process::{self, Child, ExitCode},
    time::{Duration, Instant},
};

const INTERSECT_TIMEOUT: Duration = Duration::from_secs(30);

fn output_filename(now: DateTime<Local>, ext: &str) -> String {
    format!(
        "{}_output-{}.{}",
        env!("CARGO_PKG_NAME"),
        now.format("%Y-%m-%d_%H-%M-%S"),
        ext
    )
}

fn create_new(path: &str) -> anyhow::Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("failed to open output file '{path}'"))?;
    Ok(BufWriter::new(file))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("unexpected error: {err}");
            let chain = err.chain();
            if chain.len() > 1 {
                eprintln!();
                eprintln!("context:");
                for it in chain.skip(1) {
                    eprintln!("  {it}");
                }
            }
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug)]
struct State {
    session: Session,
    config: Config,
    gnuplot: Option<Child>,
    worker: Option<WorkerHandle>,
}

impl State {
    fn graph(&self) -> &Graph {
        self.session.graph()
    }

    /// Identifiers an expression may use in the current mode, for
    /// suggestions.
    fn idents(&self) -> Idents {
        let mut idents = stdlib::standard_idents();
        let vars: &[&'static str] = match self.graph().mode() {
            PlotMode::Rectangular => &[stdlib::X],
            PlotMode::Polar => &[stdlib::T, stdlib::THETA],
        };
        for var in vars {
            idents.insert((*var).into(), Ident::Var(None));
        }
        idents
    }
}

fn try_main() -> anyhow::Result<()> {
    let config_path = env::args_os().nth(1).map(PathBuf::from);
    let config = Config::resolve(config_path.as_deref()).context("failed to load configuration")?;

    let graph = Graph::new(
        config.viewport,
        config.sampling.plot_mode,
        config.sampling.settings,
    );
    let mut state = State {
        session: Session::new(graph, config.debounce),
        config,
        gnuplot: None,
        worker: None,
    };

    let mut stdout = BufWriter::new(stdout());
    loop {
        let graph = state.graph();
        writeln!(
            stdout,
            "{} functions, {} mode, {}",
            graph.functions().len(),
            graph.mode(),
            graph.settings().angle_mode
        )?;

        let line = shell::input(&mut stdout, "> ")?;
        writeln!(stdout)?;
        let (name, args) = shell::split_command(&line);

        if let Ok(cmd) = name.parse::<Command>() {
            match cmd {
                Command::Help => {
                    for c in Command::exhaustive() {
                        writeln!(stdout, "{name}: {help}", name = c.name(), help = c.help())?;
                    }
                }

                Command::Quit => break,

                Command::Add => add_function(&mut stdout, &mut state, args)?,

                Command::Remove => {
                    if let Some(id) = shell::parse_arg::<_, FunctionId>(&mut stdout, args)? {
                        match state.session.graph_mut().remove(id) {
                            Ok(f) => writeln!(stdout, "removed {id} = {}", f.expression)?,
                            Err(err) => report(&mut stdout, &state, &err)?,
                        }
                    }
                }

                Command::Toggle => {
                    if let Some(id) = shell::parse_arg::<_, FunctionId>(&mut stdout, args)? {
                        let enabled = state.graph().function(id).map(|f| !f.enabled);
                        let graph = state.session.graph_mut();
                        match graph.set_enabled(id, enabled.unwrap_or(true)) {
                            Ok(()) => writeln!(
                                stdout,
                                "{id} is {}",
                                if enabled == Some(true) { "shown" } else { "hidden" }
                            )?,
                            Err(err) => report(&mut stdout, &state, &err)?,
                        }
                    }
                }

                Command::List => list(&mut stdout, &state)?,

                Command::SetWin => set_win(&mut stdout, &mut state)?,

                Command::Pan => {
                    let mut nums = args.split_whitespace();
                    let (Some(dx), Some(dy)) = (nums.next(), nums.next()) else {
                        writeln!(stdout, "usage: {}", Command::Pan.help())?;
                        continue;
                    };
                    let (Some(dx), Some(dy)) = (
                        shell::parse_arg::<_, Number>(&mut stdout, dx)?,
                        shell::parse_arg::<_, Number>(&mut stdout, dy)?,
                    ) else {
                        continue;
                    };
                    match state.session.target_viewport().pan(dx, dy) {
                        Ok(vp) => {
                            state.session.drag(vp, Instant::now());
                            if let Err(err) = state.session.release() {
                                report(&mut stdout, &state, &err)?;
                            }
                            writeln!(stdout, "win = {:#}", state.graph().viewport())?;
                        }
                        Err(err) => writeln!(stdout, "error: {err}")?,
                    }
                }

                Command::Zoom => {
                    if let Some(factor) = shell::parse_arg::<_, Number>(&mut stdout, args)? {
                        if !(factor.is_finite() && factor > 0.0) {
                            writeln!(stdout, "error: zoom factor must be positive")?;
                            continue;
                        }
                        let target = state.session.target_viewport();
                        match target.zoom_at(factor, target.center()) {
                            Ok(vp) => {
                                state.session.edit_range(vp, Instant::now());
                                settle(&mut stdout, &mut state)?;
                                writeln!(stdout, "win = {:#}", state.graph().viewport())?;
                            }
                            Err(err) => writeln!(stdout, "error: {err}")?,
                        }
                    }
                }

                Command::Mode => {
                    if let Some(mode) = shell::parse_arg::<_, PlotMode>(&mut stdout, args)? {
                        writeln!(stdout, "plotting in {mode} mode")?;
                        for err in state.session.graph_mut().set_mode(mode) {
                            report(&mut stdout, &state, &err)?;
                        }
                    }
                }

                Command::Angle => {
                    if let Some(angle) = shell::parse_arg::<_, AngleMode>(&mut stdout, args)? {
                        writeln!(stdout, "angles are in {angle}")?;
                        for err in state.session.graph_mut().set_angle_mode(angle) {
                            report(&mut stdout, &state, &err)?;
                        }
                    }
                }

                Command::Plot => plot(&mut stdout, &mut state)?,

                Command::Svg => {
                    let path = output_filename(Local::now(), "svg");
                    let mut svg = create_new(&path)?;
                    let graph = state.graph();
                    render::write_svg(
                        &mut svg,
                        graph.functions(),
                        graph.intersections(),
                        graph.viewport(),
                    )
                    .context("failed to write svg")?;
                    svg.flush()?;
                    writeln!(stdout, "wrote {path}")?;
                }

                Command::Intersect => intersect(&mut stdout, &mut state)?,

                Command::PrintProg => {
                    if let Some(id) = shell::parse_arg::<_, FunctionId>(&mut stdout, args)? {
                        print_prog(&mut stdout, &state, id)?;
                    }
                }
            }
        } else if !name.is_empty() {
            writeln!(stdout, r#"Unknown command, try "help" for help"#)?;
        }

        writeln!(stdout)?;
    }
    stdout.flush()?;
    Ok(())
}

fn report<W: Write>(mut out: W, state: &State, err: &GraphError) -> anyhow::Result<()> {
    match err {
        GraphError::Validation { id, source } => {
            let expr = state
                .graph()
                .function(*id)
                .map(|f| f.expression.as_str())
                .unwrap_or_default();
            shell::explain_validation(&mut out, source, expr, &state.idents())?;
        }
        GraphError::UnknownFunction(_) => writeln!(out, "error: {err}")?,
    }
    Ok(())
}

fn settle<W: Write>(mut out: W, state: &mut State) -> anyhow::Result<()> {
    for err in state.session.settle() {
        report(&mut out, state, &err)?;
    }
    Ok(())
}

fn add_function<W: Write>(mut out: W, state: &mut State, args: &str) -> anyhow::Result<()> {
    let id = state.session.graph_mut().add();
    let expr = if args.is_empty() {
        shell::input(&mut out, format_args!("{id} = "))?
    } else {
        args.to_string()
    };
    state.session.type_expression(id, &expr, Instant::now());
    settle(&mut out, state)?;

    if let Some(f) = state.graph().function(id) {
        writeln!(out, "{id} = {} ({} points)", f.expression, f.points.len())?;
    }
    Ok(())
}

fn list<W: Write>(mut out: W, state: &State) -> anyhow::Result<()> {
    let graph = state.graph();
    writeln!(out, "win = {:#}", graph.viewport())?;
    if graph.functions().is_empty() {
        writeln!(out, "no functions, try \"add\"")?;
    }
    for f in graph.functions() {
        writeln!(
            out,
            "{id} {color} {shown} {expr} ({n} points)",
            id = f.id,
            color = f.color,
            shown = if f.enabled { "shown " } else { "hidden" },
            expr = f.expression,
            n = f.points.len(),
        )?;
    }
    for i in graph.intersections() {
        writeln!(
            out,
            "{a} x {b}: ({x:.4}, {y:.4}){tangent}",
            a = i.func1,
            b = i.func2,
            x = i.x,
            y = i.y,
            tangent = if i.is_tangent { " tangent" } else { "" },
        )?;
    }
    Ok(())
}

fn set_win<W: Write>(mut out: W, state: &mut State) -> anyhow::Result<()> {
    let vp = state.session.target_viewport();
    writeln!(out, "win = {vp:#}")?;
    writeln!(out)?;
    writeln!(out, "note: leave blank to skip")?;

    let mut bounds = vp.bounds();
    for (name, dst) in [
        ("x min", &mut bounds.min_x),
        ("x max", &mut bounds.max_x),
        ("y min", &mut bounds.min_y),
        ("y max", &mut bounds.max_y),
    ] {
        match shell::read_fromstr::<_, Number>(
            &mut out,
            format_args!("?{name} (is {cur}) = ", cur = *dst),
            true,
        )? {
            Ok(Some(new)) => *dst = new,
            Ok(None) => {}
            Err(()) => return Ok(()),
        }
    }

    writeln!(out, "note: size must be a nonzero integer")?;
    for (name, dst) in [("width", &mut bounds.width), ("height", &mut bounds.height)] {
        match shell::read_fromstr::<_, NonZeroU32>(
            &mut out,
            format_args!("?{name} (is {cur}) = ", cur = *dst),
            true,
        )? {
            Ok(Some(new)) => *dst = new,
            Ok(None) => {}
            Err(()) => return Ok(()),
        }
    }

    match Viewport::try_from(bounds) {
        Ok(vp) => {
            state.session.edit_range(vp, Instant::now());
            settle(&mut out, state)?;
        }
        Err(err) => writeln!(out, "error: {err}")?,
    }
    Ok(())
}

fn print_prog<W: Write>(mut out: W, state: &State, id: FunctionId) -> anyhow::Result<()> {
    let graph = state.graph();
    let Some(f) = graph.function(id) else {
        writeln!(out, "error: no function with id {id}")?;
        return Ok(());
    };
    let angle = graph.settings().angle_mode;
    let compiled = match graph.mode() {
        PlotMode::Rectangular => CompiledExpr::new(&f.expression, angle),
        PlotMode::Polar => CompiledExpr::polar(&f.expression, angle),
    };
    match compiled {
        Ok(expr) => shell::dump_program(&mut out, expr.program(), format_args!("{id}"))?,
        Err(err) => {
            shell::explain_validation(&mut out, &err.into(), &f.expression, &state.idents())?
        }
    }
    Ok(())
}

fn intersect<W: Write>(mut out: W, state: &mut State) -> anyhow::Result<()> {
    if state.worker.is_none() {
        state.worker = Some(worker::spawn_worker().context("failed to start intersection worker")?);
    }
    let job = state.graph().job(state.config.sampling.max_resolution);
    let Some(worker) = state.worker.as_mut() else {
        return Ok(());
    };

    let id = worker.compute(job).context("failed to send request to worker")?;
    match worker.wait_for(id, INTERSECT_TIMEOUT) {
        Ok(Response::Success { outcome, .. }) => {
            writeln!(
                out,
                "{} intersections between {} functions in {:?}",
                outcome.intersections.len(),
                outcome.function_count,
                outcome.calculation_time
            )?;
            for i in &outcome.intersections {
                writeln!(
                    out,
                    "  {} x {}: ({:.6}, {:.6}){}",
                    i.func1,
                    i.func2,
                    i.x,
                    i.y,
                    if i.is_tangent { " tangent" } else { "" }
                )?;
            }
        }
        Ok(Response::Error { error, .. } | Response::Fault { error, .. }) => {
            writeln!(out, "no results: {error}")?;
        }
        Ok(other) => warn!("unexpected response {other:?}"),
        Err(err) => {
            writeln!(out, "no results: {err}")?;
            // a worker that stopped answering is replaced on next use
            state.worker = None;
        }
    }
    Ok(())
}

fn plot<W: Write>(mut out: W, state: &mut State) -> anyhow::Result<()> {
    let graph = state.session.graph();
    let drawn: Vec<_> = graph
        .functions()
        .iter()
        .filter(|f| f.enabled && f.points.iter().any(|p| p.is_finite()))
        .collect();
    if drawn.is_empty() {
        writeln!(out, "error: nothing to plot")?;
        return Ok(());
    }

    // set up gnuplot
    if let Some(mut old_child) = state.gnuplot.take() {
        old_child
            .kill()
            .context("failed to kill previous gnuplot child")?;
    }
    let now = Local::now();
    let data_path = output_filename(now, "data");
    let gnuplot_path = output_filename(now, "gnuplot");
    let svg_path = output_filename(now, "svg");
    let mut data = create_new(&data_path)?;
    let mut gnuplot = create_new(&gnuplot_path)?;

    // one data block per function, then one for intersections
    for f in &drawn {
        render::write_gnuplot_data(&mut data, &f.points)
            .context("failed to write to output data file")?;
        writeln!(data)?;
        writeln!(data)?;
    }
    let intersections = graph.intersections();
    render::write_gnuplot_points(&mut data, intersections)
        .context("failed to write to output data file")?;
    data.flush()?;
    data.get_mut().sync_data()?;
    drop(data);

    writeln!(gnuplot, "reset")?;
    writeln!(gnuplot, "set term push")?;
    // set output info
    let (width, height) = (state.config.output.width, state.config.output.height);
    writeln!(gnuplot, "set terminal svg size {width},{height} enhanced")?;
    writeln!(gnuplot, "set output '{svg_path}'")?;

    // set window
    let vp = graph.viewport();
    writeln!(gnuplot, "set xrange[{}:{}]", vp.min_x(), vp.max_x())?;
    writeln!(gnuplot, "set yrange[{}:{}]", vp.min_y(), vp.max_y())?;

    // configure appearence
    writeln!(gnuplot, r#"set title "{data_path}""#)?;
    writeln!(gnuplot, "set title noenhanced")?;
    writeln!(gnuplot, "set grid")?;
    writeln!(gnuplot, "set xzeroaxis")?;
    writeln!(gnuplot, "set yzeroaxis")?;
    writeln!(gnuplot, "set tics out nomirror")?;
    writeln!(gnuplot, "set key out vertical top right")?;
    writeln!(gnuplot, r#"set key title "Key""#)?;

    // plot svg
    writeln!(gnuplot, "plot \\")?;
    for (index, f) in drawn.iter().enumerate() {
        writeln!(
            gnuplot,
            r#"  '{data_path}' index {index} with lines lw 2 lc rgb '{color}' title "{id} = {expr}" noenhanced, \"#,
            color = f.color,
            id = f.id,
            expr = f.expression.replace('"', "'"),
        )?;
    }
    if intersections.is_empty() {
        // keeps the trailing comma above valid
        writeln!(gnuplot, "  NaN notitle")?;
    } else {
        writeln!(
            gnuplot,
            r#"  '{data_path}' index {} with points pt 7 lc rgb 'black' title "intersections""#,
            drawn.len()
        )?;
    }

    // display window
    writeln!(gnuplot, "set term pop")?;
    writeln!(gnuplot, "replot")?;

    // done with the file
    gnuplot.flush()?;
    gnuplot.get_mut().sync_data()?;
    drop(gnuplot);

    // spawn gnuplot and provide the path to the file
    let mut cmd = process::Command::new("gnuplot");
    cmd.arg("--persist").arg(&gnuplot_path);
    #[cfg(not(debug_assertions))]
    {
        cmd.stdout(Stdio::null())
            .stderr(Stdio::null())
            .stdin(Stdio::null());
    }
    let child = cmd
        .spawn()
        .context("failed to spawn gnuplot (is it installed and in ${{PATH}}?)")?;
    info!("gnuplot is rendering {gnuplot_path}");

    state.gnuplot = Some(child);
    Ok(())
}
