use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use cop_core::evaluator::{explain, explain_note};
use cop_core::{ClassificationBanner, ClassificationLevel, EntitlementStore, NarrowingSelection};
use cop_protocol::NoteRecord;
use serde_json::json;

use super::util::{print_json, read_json, read_objects};

#[derive(Args)]
pub struct EvaluateArgs {
    /// JSON array of entitlement FQNs issued to the principal
    #[arg(long)]
    pub entitlements: PathBuf,
    /// JSON array of decrypted object payloads
    #[arg(long)]
    pub objects: PathBuf,
    /// JSON array of notes (`{id, parentId, search}`)
    #[arg(long)]
    pub notes: Option<PathBuf>,
    /// Narrow to this classification ceiling before evaluating
    #[arg(long)]
    pub level: Option<String>,
    /// Need-to-know values kept when narrowing
    #[arg(long = "ntk")]
    pub need_to_know: Vec<String>,
    /// Rel-to values kept when narrowing
    #[arg(long = "relto")]
    pub rel_to: Vec<String>,
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Args)]
pub struct BannerArgs {
    /// JSON array of decrypted object payloads
    #[arg(long)]
    pub objects: PathBuf,
    /// Notes folded into a single object's banner (requires --object)
    #[arg(long)]
    pub notes: Option<PathBuf>,
    /// Compute the banner for this object id and its notes only
    #[arg(long)]
    pub object: Option<String>,
}

pub fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let granted: Vec<String> = read_json(&args.entitlements)?;
    let store = EntitlementStore::new();
    let mut active = store.sign_in(Some(granted))?;
    if let Some(level) = &args.level {
        let classification = ClassificationLevel::from_simple_name(level)
            .ok_or_else(|| anyhow!("unknown classification level: {level}"))?;
        active = store.narrow(&NarrowingSelection {
            classification,
            need_to_know: args.need_to_know.clone(),
            rel_to: args.rel_to.clone(),
        })?;
    }

    let objects = read_objects(&args.objects)?;
    let mut visible = Vec::new();
    let mut verdicts = Vec::with_capacity(objects.len());
    for object in &objects {
        let verdict = explain(object, &active);
        if !verdict.is_blocked() {
            visible.push(object);
        }
        verdicts.push(json!({"id": object.id, "result": verdict}));
    }

    let notes: Vec<NoteRecord> = match &args.notes {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    let note_verdicts: Vec<_> = notes
        .iter()
        .map(|n| json!({"id": n.id, "parentId": n.parent_id, "result": explain_note(n, &active)}))
        .collect();

    let mut names: Vec<&String> = active.simple_names().iter().collect();
    names.sort();
    let banner = ClassificationBanner::compute(visible);
    print_json(
        &json!({
            "active": names,
            "objects": verdicts,
            "notes": note_verdicts,
            "banner": banner.display(),
        }),
        args.pretty,
    )
}

pub fn run_banner(args: BannerArgs) -> Result<()> {
    let objects = read_objects(&args.objects)?;
    let banner = match &args.object {
        Some(id) => {
            let object = objects
                .iter()
                .find(|o| &o.id == id)
                .with_context(|| format!("object {id} not found"))?;
            let notes: Vec<NoteRecord> = match &args.notes {
                Some(path) => read_json(path)?,
                None => Vec::new(),
            };
            let attached: Vec<NoteRecord> = notes
                .into_iter()
                .filter(|n| n.parent_id.as_deref() == Some(id.as_str()))
                .collect();
            ClassificationBanner::for_object(object, &attached)
        }
        None => ClassificationBanner::compute(&objects),
    };
    println!("{}", banner);
    Ok(())
}
