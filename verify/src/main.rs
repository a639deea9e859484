// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::{Context, Result};
use cim_kernel::aggregate::Aggregate;
use cim_kernel::cid::Cid;
use cim_kernel::dialog::DialogState;
use cim_kernel::envelope::Envelope;
use cim_kernel::graph::GraphState;
use cim_kernel::proof::StreamProof;
use cim_kernel::replay::replay;
use cim_kernel::types::id::StreamId;
use cim_kernel::verify::{verify_chain, VerificationResult};
use cim_log::{list_logs, read_stream_log, sealed_marker, EventLogError, StreamExport};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory of a cim-node (one `.log` file per stream)
    data_dir: PathBuf,

    /// Only check this stream
    #[arg(long)]
    stream: Option<String>,

    /// Print the envelopes of this stream instead of a report
    #[arg(long)]
    export: Option<String>,

    /// Also replay every stream with this aggregate and print its proof
    #[arg(long, value_enum)]
    aggregate: Option<AggregateKind>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AggregateKind {
    Graph,
    Dialog,
}

#[derive(Serialize)]
struct StreamReport {
    stream_id: StreamId,
    file: PathBuf,
    length: u64,
    head_cid: Option<Cid>,
    sealed: bool,
    torn_tail: bool,
    verification: VerificationResult,
    proof: Option<StreamProof>,
    replay_error: Option<String>,
}

#[derive(Serialize)]
struct Report {
    data_dir: PathBuf,
    intact: bool,
    streams: Vec<StreamReport>,
    /// Logs torn before their header was complete. They hold no envelopes;
    /// the node removes them on its next open.
    headerless: Vec<PathBuf>,
}

struct LoadedStream {
    path: PathBuf,
    stream_id: StreamId,
    envelopes: Vec<Envelope>,
    torn_tail: bool,
}

fn load_streams(dir: &Path) -> Result<(Vec<LoadedStream>, Vec<PathBuf>)> {
    let mut streams = Vec::new();
    let mut headerless = Vec::new();
    for path in list_logs(dir).context("Failed to list stream logs")? {
        let contents = match read_stream_log(&path) {
            Ok(contents) => contents,
            Err(EventLogError::IncompleteHeader { .. }) => {
                headerless.push(path);
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", path)),
        };
        streams.push(LoadedStream {
            path,
            stream_id: contents.stream_id,
            envelopes: contents.envelopes,
            torn_tail: contents.torn_tail,
        });
    }
    Ok((streams, headerless))
}

fn prove<A: Aggregate>(stream: &LoadedStream) -> Result<StreamProof, String> {
    let state: A = replay(&stream.envelopes)
        .map_err(|f| format!("sequence {}: {}", f.sequence, f.cause))?;
    Ok(StreamProof::of(
        stream.stream_id.clone(),
        stream.envelopes.len() as u64,
        stream.envelopes.last().map(|e| e.cid),
        &state,
    ))
}

fn check(stream: &LoadedStream, aggregate: Option<AggregateKind>) -> StreamReport {
    let verification = verify_chain(&stream.stream_id, &stream.envelopes);

    let (proof, replay_error) = match (aggregate, verification.is_intact()) {
        (Some(kind), true) => {
            let result = match kind {
                AggregateKind::Graph => prove::<GraphState>(stream),
                AggregateKind::Dialog => prove::<DialogState>(stream),
            };
            match result {
                Ok(proof) => (Some(proof), None),
                Err(e) => (None, Some(e)),
            }
        }
        _ => (None, None),
    };

    StreamReport {
        stream_id: stream.stream_id.clone(),
        file: stream.path.clone(),
        length: stream.envelopes.len() as u64,
        head_cid: stream.envelopes.last().map(|e| e.cid),
        sealed: sealed_marker(&stream.path).exists(),
        torn_tail: stream.torn_tail,
        verification,
        proof,
        replay_error,
    }
}

fn find<'a>(streams: &'a [LoadedStream], id: &str) -> Result<&'a LoadedStream> {
    streams
        .iter()
        .find(|s| s.stream_id.as_str() == id)
        .with_context(|| format!("No log for stream {:?}", id))
}

fn main() -> Result<()> {
    let args = Args::parse();

    eprintln!("CIM Verifier v{}", env!("CARGO_PKG_VERSION"));
    let (streams, headerless) = load_streams(&args.data_dir)?;
    for path in &headerless {
        eprintln!("Skipping {:?}: torn before its header was complete", path);
    }

    if let Some(id) = &args.export {
        let stream = find(&streams, id)?;
        let export = StreamExport::full(
            stream.stream_id.clone(),
            &stream.envelopes,
            sealed_marker(&stream.path).exists(),
        );
        println!("{}", serde_json::to_string_pretty(&export)?);
        return Ok(());
    }

    let selected: Vec<&LoadedStream> = match &args.stream {
        Some(id) => vec![find(&streams, id)?],
        None => streams.iter().collect(),
    };

    let reports: Vec<StreamReport> = selected.into_iter().map(|s| check(s, args.aggregate)).collect();
    let intact = reports
        .iter()
        .all(|r| r.verification.is_intact() && r.replay_error.is_none());
    let report = Report {
        data_dir: args.data_dir.clone(),
        intact,
        streams: reports,
        headerless,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !intact {
        eprintln!("Integrity check FAILED");
        std::process::exit(1);
    }
    Ok(())
}
