//! CLI entry point for mindmap.
//!
//! Works on `.canvas` files directly, without an editor attached: the file
//! is loaded into a headless host, the same session that backs the editor
//! integration runs against it, and the host autosave writes it back.
//!
//! Opening a file always converges its floating and collapse state first,
//! so even `status` may rewrite a document whose records had drifted.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use mindmap_core::{CanvasEdge, EdgeId, FloatingInfo, NodeId};
use mindmap_engine::{HeadlessHost, HostEvent, HostGraphView, MindmapSession, MindmapSettings};
use mindmap_storage::{DocumentStore, FsStore};

#[derive(Parser)]
#[command(name = "mindmap", about = "Mindmap layout and floating-node upkeep for canvas files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lay out the mindmap and save the new positions
    Arrange {
        #[command(flatten)]
        target: Target,
    },
    /// Print floating records, collapse state and positions as JSON
    Status {
        #[command(flatten)]
        target: Target,
    },
    /// Delete an edge, detaching its target
    Detach {
        #[command(flatten)]
        target: Target,
        /// Id of the edge to delete
        #[arg(long)]
        edge: String,
    },
    /// Draw a new edge between two nodes
    Attach {
        #[command(flatten)]
        target: Target,
        /// Parent node id
        #[arg(long)]
        from: String,
        /// Child node id
        #[arg(long)]
        to: String,
    },
    /// Toggle collapse on a node
    Collapse {
        #[command(flatten)]
        target: Target,
        /// Node to collapse or expand
        node: String,
    },
    /// Repair floating records and print what changed as JSON
    Reconcile {
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Args)]
struct Target {
    /// Path to the .canvas file
    file: PathBuf,

    /// JSON settings file (plugin settings shape)
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            process::exit(3);
        }
    };

    let code = runtime.block_on(async move {
        match cli.command {
            Commands::Arrange { target } => run_arrange(&target),
            Commands::Status { target } => run_status(&target),
            Commands::Detach { target, edge } => run_detach(&target, &edge).await,
            Commands::Attach { target, from, to } => run_attach(&target, &from, &to).await,
            Commands::Collapse { target, node } => run_collapse(&target, &node),
            Commands::Reconcile { target } => run_reconcile(&target),
        }
    });
    process::exit(code);
}

struct Opened {
    host: Arc<HeadlessHost>,
    session: MindmapSession,
}

/// Loads settings and the document. Failures here are I/O failures.
fn open(target: &Target) -> Result<Opened, i32> {
    let settings = match &target.settings {
        Some(path) => MindmapSettings::load(path).map_err(|e| {
            eprintln!("Error: {}", e);
            3
        })?,
        None => MindmapSettings::default(),
    };

    let store: Arc<dyn DocumentStore> = Arc::new(FsStore::new());
    let host = HeadlessHost::open(Arc::clone(&store), &target.file).map_err(|e| {
        eprintln!("Error: {}", e);
        3
    })?;
    let host = Arc::new(host);
    let view: Arc<dyn HostGraphView> = host.clone();
    let session = MindmapSession::open(store, view, &target.file, settings);
    Ok(Opened { host, session })
}

fn run_arrange(target: &Target) -> i32 {
    let mut opened = match open(target) {
        Ok(o) => o,
        Err(code) => return code,
    };

    match opened.session.try_arrange() {
        Ok(moved) => {
            println!("Arranged {}: {} node(s) moved", target.file.display(), moved);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    file: PathBuf,
    nodes: usize,
    edges: usize,
    roots: Vec<NodeId>,
    floating_nodes: BTreeMap<NodeId, FloatingInfo>,
    collapsed_nodes: Vec<NodeId>,
    hidden_nodes: Vec<NodeId>,
    positions: BTreeMap<NodeId, Position>,
}

#[derive(Serialize)]
struct Position {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

fn run_status(target: &Target) -> i32 {
    let opened = match open(target) {
        Ok(o) => o,
        Err(code) => return code,
    };
    let session = &opened.session;

    let nodes = opened.host.nodes();
    let (tree, visible) = session.collapse().visible();
    let report = StatusReport {
        file: target.file.clone(),
        nodes: nodes.len(),
        edges: opened.host.edges().len(),
        roots: tree.roots(),
        floating_nodes: session.floating().floating_nodes().clone(),
        collapsed_nodes: session.collapse().state().iter().cloned().collect(),
        hidden_nodes: visible.hidden.into_iter().collect(),
        positions: nodes
            .into_iter()
            .map(|n| {
                let pos = Position {
                    x: n.x,
                    y: n.y,
                    width: n.width,
                    height: n.height,
                };
                (n.id, pos)
            })
            .collect(),
    };

    let output = serde_json::to_string_pretty(&report).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e));
    println!("{}", output);
    0
}

async fn run_detach(target: &Target, edge: &str) -> i32 {
    let mut opened = match open(target) {
        Ok(o) => o,
        Err(code) => return code,
    };

    let Some(removed) = opened.host.remove_edge(&EdgeId::new(edge)) else {
        eprintln!("Error: edge '{}' not found", edge);
        return 1;
    };
    opened.session.handle_event(HostEvent::EdgeDeleted(removed.clone())).await;
    // The edge removal itself only exists in the live copy until saved.
    opened.host.request_save();

    match removed.to_id() {
        Some(child) if opened.session.floating().is_floating(&child) => {
            println!("Detached {} (now floating)", child);
        }
        Some(child) => println!("Removed edge {}; {} is still attached", edge, child),
        None => println!("Removed edge {}", edge),
    }
    0
}

async fn run_attach(target: &Target, from: &str, to: &str) -> i32 {
    let mut opened = match open(target) {
        Ok(o) => o,
        Err(code) => return code,
    };

    let from = NodeId::new(from);
    let to = NodeId::new(to);
    for id in [&from, &to] {
        if opened.host.node_data(id).is_none() {
            eprintln!("Error: node '{}' not found", id);
            return 1;
        }
    }

    let id = Uuid::new_v4().simple().to_string();
    let edge = CanvasEdge::new(&id[..16], &from, &to);
    if let Err(e) = opened.host.add_edge(edge.clone()) {
        eprintln!("Error: {}", e);
        return 1;
    }
    opened.session.handle_event(HostEvent::EdgeCreated(edge.clone())).await;
    opened.host.request_save();

    println!("Created edge {} ({} -> {})", edge.id, from, to);
    if !opened.session.floating().is_floating(&to) {
        println!("{} is attached", to);
    }
    0
}

fn run_collapse(target: &Target, node: &str) -> i32 {
    let mut opened = match open(target) {
        Ok(o) => o,
        Err(code) => return code,
    };

    let id = NodeId::new(node);
    match opened.session.toggle_collapse(&id) {
        Some(true) => {
            println!("Collapsed {}", id);
            0
        }
        Some(false) => {
            println!("Expanded {}", id);
            0
        }
        None => {
            eprintln!("Error: node '{}' not found", id);
            1
        }
    }
}

fn run_reconcile(target: &Target) -> i32 {
    let mut opened = match open(target) {
        Ok(o) => o,
        Err(code) => return code,
    };

    // Opening runs the repair pass; a second pass must come back clean.
    let report = opened.session.opening_report().clone();
    let second = opened.session.reconcile();
    if !second.is_clean() {
        tracing::warn!(file = %target.file.display(), ?second, "reconciliation did not settle");
    }
    let output = serde_json::to_string_pretty(&report).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e));
    println!("{}", output);
    if second.is_clean() {
        0
    } else {
        1
    }
}
