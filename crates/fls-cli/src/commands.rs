use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use fls_store::{
    input_hash_of, ArtifactId, ArtifactStore, FsProjectStore, NewNode, NodeId, NodeStatus,
    ProjectId, ProjectStore, SaveArtifact, Severity, StoreConfig, VersionNode,
};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.root, cli.config.as_deref())?;
    debug!(root = %config.root.display(), branch = %config.default_branch, "loaded configuration");
    let format = cli.format;
    match cli.command {
        Command::Projects => cmd_projects(&config, format),
        Command::Config(args) => cmd_config(&config, args, format),
        command => {
            let store = open_store(config, cli.project.as_deref())?;
            match command {
                Command::Init(args) => cmd_init(&store, args, format),
                Command::Status => cmd_status(&store, format),
                Command::Node(args) => cmd_node(&store, args, format),
                Command::Save(args) => cmd_save(&store, args, format),
                Command::Mark(args) => cmd_mark(&store, args, format),
                Command::Reuse(args) => cmd_reuse(&store, args, format),
                Command::Branch(args) => cmd_branch(&store, args, format),
                Command::Switch(args) => cmd_switch(&store, args, format),
                Command::Log(args) => cmd_log(&store, args, format),
                Command::Show(args) => cmd_show(&store, args, format),
                Command::Artifact(args) => cmd_artifact(&store, args, format),
                Command::Ops => cmd_ops(&store, format),
                Command::Validate => cmd_validate(&store, format),
                Command::Projects | Command::Config(_) => unreachable!("handled above"),
            }
        }
    }
}

fn load_config(root: Option<PathBuf>, path: Option<&Path>) -> anyhow::Result<StoreConfig> {
    let mut config = match path {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(root) = root {
        config.root = root;
    }
    Ok(config)
}

fn open_store(config: StoreConfig, project: Option<&str>) -> anyhow::Result<ArtifactStore> {
    let project = project.context("no project given (use --project or FLS_PROJECT)")?;
    let id = ProjectId::new(project)?;
    Ok(ArtifactStore::open(config, id)?)
}

/// Accept a full node id, `HEAD`, or a unique id prefix.
fn resolve_node(store: &ArtifactStore, reference: &str) -> anyhow::Result<NodeId> {
    if let Ok(id) = reference.parse::<NodeId>() {
        return Ok(id);
    }
    if reference == "HEAD" {
        return store
            .head()?
            .map(|n| n.id)
            .context("project has no nodes yet");
    }
    let matches: Vec<NodeId> = store
        .project()?
        .node_ids
        .into_iter()
        .filter(|id| id.to_string().starts_with(reference))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => bail!("no node matches '{reference}'"),
        _ => bail!("'{reference}' is ambiguous ({} nodes match)", matches.len()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn status_label(status: NodeStatus) -> ColoredString {
    match status {
        NodeStatus::Completed => status.tag().green(),
        NodeStatus::Cached => status.tag().cyan(),
        NodeStatus::Failed => status.tag().red(),
        NodeStatus::Generating => status.tag().yellow(),
        NodeStatus::Pending => status.tag().dimmed(),
    }
}

fn parse_json(text: &str, what: &str) -> anyhow::Result<Value> {
    serde_json::from_str(text).with_context(|| format!("{what} is not valid JSON"))
}

// ---------------------------------------------------------------
// Project
// ---------------------------------------------------------------

fn cmd_init(store: &ArtifactStore, args: InitArgs, format: OutputFormat) -> anyhow::Result<()> {
    let project = if args.name.is_some() || args.description.is_some() {
        let _lock = store.lock()?;
        store.set_project_metadata(args.name.as_deref(), args.description.as_deref())?
    } else {
        store.project()?
    };
    if format == OutputFormat::Json {
        return print_json(&project);
    }
    println!("{} Project {} ({})", "✓".green().bold(), project.name.bold(), project.id);
    println!("  Default branch: {}", store.config().default_branch.yellow());
    println!("  Root: {}", store.config().root.display());
    Ok(())
}

fn cmd_projects(config: &StoreConfig, format: OutputFormat) -> anyhow::Result<()> {
    let projects = FsProjectStore::new(config.projects_dir()).list_projects()?;
    if format == OutputFormat::Json {
        let ids: Vec<&str> = projects.iter().map(ProjectId::as_str).collect();
        return print_json(&ids);
    }
    if projects.is_empty() {
        println!("No projects under {}.", config.projects_dir().display());
    }
    for id in &projects {
        println!("{id}");
    }
    Ok(())
}

fn cmd_status(store: &ArtifactStore, format: OutputFormat) -> anyhow::Result<()> {
    let project = store.project()?;
    let head = store.head()?;
    if format == OutputFormat::Json {
        return print_json(&json!({ "project": project, "head": head }));
    }
    println!("Project {} ({})", project.name.bold(), project.id);
    if !project.description.is_empty() {
        println!("  {}", project.description);
    }
    println!(
        "Nodes: {}, branches: {}",
        project.node_ids.len().to_string().bold(),
        project.branches.len().to_string().bold()
    );
    match head {
        Some(node) => println!("HEAD: {}", node.summary()),
        None => println!("HEAD: {}", "(no nodes yet)".dimmed()),
    }
    Ok(())
}

fn cmd_config(config: &StoreConfig, args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    if let Some(path) = &args.write {
        config.save(path)?;
        println!("{} Wrote {}", "✓".green(), path.display());
        return Ok(());
    }
    if format == OutputFormat::Json {
        return print_json(config);
    }
    println!("root = {}", config.root.display());
    println!("default_branch = {}", config.default_branch);
    println!("sync_writes = {}", config.sync_writes);
    Ok(())
}

// ---------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------

fn cmd_node(store: &ArtifactStore, args: NodeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let _lock = store.lock()?;
    let parent = match &args.parent {
        Some(reference) => Some(store.get_node(&resolve_node(store, reference)?)?),
        None => store.head()?,
    };

    let mut req = NewNode::new(args.stage);
    if let Some(parent) = &parent {
        req = req.child_of(parent.id);
    }
    // Extending a node stays on its branch unless told otherwise.
    match (args.branch, &parent) {
        (Some(branch), _) => req = req.on_branch(branch),
        (None, Some(parent)) => req = req.on_branch(parent.branch_name.clone()),
        (None, None) => {}
    }
    if let Some(message) = args.message {
        req = req.message(message);
    }
    if let Some(inputs) = &args.inputs {
        req = req.input_hash(input_hash_of(&parse_json(inputs, "--inputs")?)?);
    }

    let node = store.create_node(req)?;
    if format == OutputFormat::Json {
        return print_json(&node);
    }
    println!(
        "{} Created node {} {} {} on {}",
        "✓".green().bold(),
        node.id.short_id().yellow(),
        node.version,
        node.stage,
        node.branch_name.green()
    );
    println!("  id: {}", node.id);
    Ok(())
}

fn cmd_save(store: &ArtifactStore, args: SaveArgs, format: OutputFormat) -> anyhow::Result<()> {
    let _lock = store.lock()?;
    let node = store.get_node(&resolve_node(store, &args.node)?)?;
    let data = match (&args.data, &args.file) {
        (Some(text), _) => parse_json(text, "--data")?,
        (None, Some(path)) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            parse_json(&text, &path.display().to_string())?
        }
        (None, None) => bail!("pass --data or --file"),
    };

    let mut req = SaveArtifact::new(node.stage, args.artifact_type, data);
    if let Some(summary) = args.summary {
        req = req.summary(summary);
    }
    if let Some(path) = &args.preview {
        let preview = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        req = req.preview(preview);
    }

    let meta = store.save_artifact(&node.id, req)?;
    if format == OutputFormat::Json {
        return print_json(&meta);
    }
    println!(
        "{} Saved artifact {} ({} bytes)",
        "✓".green().bold(),
        meta.id.to_string().yellow(),
        meta.size_bytes
    );
    println!("  Location: {}", meta.storage_location);
    Ok(())
}

fn cmd_mark(store: &ArtifactStore, args: MarkArgs, format: OutputFormat) -> anyhow::Result<()> {
    let _lock = store.lock()?;
    let id = resolve_node(store, &args.node)?;
    let node = store.mark_status(&id, args.status, args.error)?;
    if format == OutputFormat::Json {
        return print_json(&node);
    }
    println!("Node {} is now {}", node.id.short_id().yellow(), status_label(node.status));
    Ok(())
}

fn cmd_reuse(store: &ArtifactStore, args: ReuseArgs, format: OutputFormat) -> anyhow::Result<()> {
    let _lock = store.lock()?;
    let node = store.get_node(&resolve_node(store, &args.node)?)?;
    let source = match &args.from {
        Some(reference) => resolve_node(store, reference)?,
        None => {
            let hash = node
                .input_hash
                .context("node has no input hash to look up")?;
            store
                .find_cached(&node.branch_name, node.stage, &hash)?
                .map(|n| n.id)
                .context("no earlier run matches this node's inputs")?
        }
    };

    let node = store.mark_cached(&node.id, &source)?;
    if format == OutputFormat::Json {
        return print_json(&node);
    }
    let artifact = node
        .artifact_reference
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    println!(
        "{} Node {} reuses {} from {}",
        "✓".green().bold(),
        node.id.short_id().yellow(),
        artifact.cyan(),
        source.short_id()
    );
    Ok(())
}

fn cmd_show(store: &ArtifactStore, args: ShowArgs, format: OutputFormat) -> anyhow::Result<()> {
    let node = store.get_node(&resolve_node(store, &args.node)?)?;
    if format == OutputFormat::Json {
        return print_json(&node);
    }
    println!("{} {}", "node".yellow().bold(), node.id.to_string().yellow());
    println!("Version:  {} ({})", node.version, node.branch_name.green());
    println!("Stage:    {} (#{})", node.stage, node.stage_index);
    println!("Status:   {}", status_label(node.status));
    if let Some(parent) = node.parent_id {
        println!("Parent:   {parent}");
    }
    if let Some(artifact) = &node.artifact_reference {
        println!("Artifact: {}", artifact.to_string().cyan());
    }
    if let Some(hash) = &node.input_hash {
        println!("Inputs:   {}", hash.short_hex());
    }
    println!("Created:  {}", node.created_at.to_rfc3339());
    if !node.commit_message.is_empty() {
        println!("\n    {}", node.commit_message);
    }
    if !node.metadata.is_empty() {
        println!("\n{}", serde_json::to_string_pretty(&node.metadata)?);
    }
    Ok(())
}

fn cmd_log(store: &ArtifactStore, args: LogArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut nodes = match &args.branch {
        Some(branch) => store.list_nodes(Some(branch))?,
        None => match store.head()? {
            Some(head) => store.history(&head.id)?,
            None => Vec::new(),
        },
    };
    nodes.reverse();
    if let Some(limit) = args.limit {
        nodes.truncate(limit);
    }

    if format == OutputFormat::Json {
        return print_json(&nodes);
    }
    for node in &nodes {
        if args.oneline {
            println!("{}", node.summary());
        } else {
            print_log_entry(node);
        }
    }
    Ok(())
}

fn print_log_entry(node: &VersionNode) {
    println!(
        "{}  {}  ({})",
        node.version.yellow().bold(),
        node.id.to_string().dimmed(),
        node.branch_name.green()
    );
    println!("  {} | {}", status_label(node.status), node.stage);
    if !node.commit_message.is_empty() {
        println!("  {}", node.commit_message);
    }
    println!();
}

// ---------------------------------------------------------------
// Branches
// ---------------------------------------------------------------

fn cmd_branch(store: &ArtifactStore, args: BranchArgs, format: OutputFormat) -> anyhow::Result<()> {
    let Some(name) = args.name else {
        return list_branches(store, format);
    };
    let _lock = store.lock()?;
    let from = match &args.from {
        Some(reference) => resolve_node(store, reference)?,
        None => resolve_node(store, "HEAD")?,
    };
    let node = store.create_branch(&from, &name, args.message.as_deref().unwrap_or_default())?;
    if format == OutputFormat::Json {
        return print_json(&node);
    }
    println!(
        "{} Created branch {} at {} {}",
        "✓".green().bold(),
        name.yellow(),
        node.id.short_id(),
        node.version
    );
    Ok(())
}

fn list_branches(store: &ArtifactStore, format: OutputFormat) -> anyhow::Result<()> {
    let branches = store.list_branches()?;
    if format == OutputFormat::Json {
        return print_json(&branches);
    }
    let head = store.project()?.current_node_id;
    for (name, node) in &branches {
        if Some(*node) == head {
            println!("* {}  {}", name.green().bold(), node.short_id().dimmed());
        } else {
            println!("  {}  {}", name, node.short_id().dimmed());
        }
    }
    Ok(())
}

fn cmd_switch(store: &ArtifactStore, args: SwitchArgs, format: OutputFormat) -> anyhow::Result<()> {
    let _lock = store.lock()?;
    let head = store.switch_branch(&args.branch)?;
    if format == OutputFormat::Json {
        return print_json(&head);
    }
    println!("Switched to {} ({})", args.branch.yellow().bold(), head.summary());
    Ok(())
}

fn cmd_ops(store: &ArtifactStore, format: OutputFormat) -> anyhow::Result<()> {
    let ops = store.branch_operations()?;
    if format == OutputFormat::Json {
        return print_json(&ops);
    }
    if ops.is_empty() {
        println!("No branch operations.");
    }
    for op in &ops {
        let mut line = format!(
            "{}  {} {} from {}",
            op.created_at.format("%Y-%m-%d %H:%M:%S"),
            op.operation_type.to_string().cyan(),
            op.target_branch.yellow(),
            op.source_node_id.short_id()
        );
        if !op.message.is_empty() {
            line.push_str(": ");
            line.push_str(&op.message);
        }
        println!("{line}");
    }
    Ok(())
}

// ---------------------------------------------------------------
// Artifacts and checks
// ---------------------------------------------------------------

fn cmd_artifact(store: &ArtifactStore, args: ArtifactArgs, format: OutputFormat) -> anyhow::Result<()> {
    let id = ArtifactId::from_raw(args.id);
    let (data, meta) = store.get_artifact(&id)?;
    if let Some(path) = &args.preview_out {
        let preview = store
            .read_preview(&id)?
            .with_context(|| format!("artifact {id} has no preview"))?;
        fs::write(path, preview).with_context(|| format!("writing {}", path.display()))?;
    }
    if format == OutputFormat::Json {
        return print_json(&json!({ "metadata": meta, "data": data }));
    }
    println!("{} {}", "artifact".yellow().bold(), meta.id.to_string().yellow());
    println!("Type:  {} ({})", meta.artifact_type, meta.stage);
    println!("Size:  {} bytes", meta.size_bytes);
    println!("Hash:  {}", meta.content_hash);
    if !meta.summary.is_empty() {
        println!("\n    {}", meta.summary);
    }
    println!("\n{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

fn cmd_validate(store: &ArtifactStore, format: OutputFormat) -> anyhow::Result<()> {
    let report = store.validate()?;
    if format == OutputFormat::Json {
        print_json(&report)?;
    } else {
        for v in &report.violations {
            let label = match v.severity {
                Severity::Error => "error".red().bold(),
                Severity::Warning => "warning".yellow(),
            };
            println!("{label}: {}", v.description);
        }
        if report.is_valid() {
            println!(
                "{} {} nodes, {} branches, no errors",
                "✓".green().bold(),
                report.node_count,
                report.branch_count
            );
        }
    }
    if !report.is_valid() {
        bail!("validation failed with {} error(s)", report.errors().count());
    }
    Ok(())
}
