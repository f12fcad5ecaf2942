//! Subcommand implementations.
//!
//! Each command drives one engine operation and prints a human-readable
//! summary of the resulting transaction state.

use std::fs;
use std::path::Path;
use std::thread;

use anyhow::{Context, Result, bail};
use escrow_core::engine::{EscrowEngine, InitiateRequest, WorkFile};
use escrow_core::role::ConversationContext;
use escrow_core::sync::{PollTick, StopReason};
use escrow_core::transaction::Transaction;

/// Initiate a transaction as the buyer.
#[allow(clippy::too_many_arguments)]
pub fn init(
    engine: &EscrowEngine,
    user: &str,
    seller: &str,
    amount: f64,
    payee: &str,
    post: Option<&str>,
    description: Option<&str>,
    post_author: Option<String>,
    contact_initiator: Option<String>,
    code_out: Option<&Path>,
) -> Result<()> {
    let context = ConversationContext {
        post_author,
        contact_initiator,
    };
    let outcome = engine.initiate(&InitiateRequest {
        buyer_id: user,
        seller_id: seller,
        post_id: post,
        amount,
        payee,
        work_description: description,
        context: Some(&context),
    })?;

    let txn = &outcome.transaction;
    println!("Initiated transaction {}", txn.transaction_id);
    if txn.is_local() {
        println!("(store unavailable; this transaction lives in this session only)");
    }
    print_transaction(txn);
    println!("Payment payload: {}", txn.payment_payload);

    if let Some(path) = code_out {
        fs::write(path, &outcome.code_svg)
            .with_context(|| format!("failed to write payment code to {}", path.display()))?;
        println!("Payment code written to {}", path.display());
    }
    Ok(())
}

/// Show a transaction.
pub fn show(engine: &EscrowEngine, user: &str, record_id: &str) -> Result<()> {
    let txn = engine.fetch(user, record_id)?;
    print_transaction(&txn);
    Ok(())
}

/// Submit proof of payment as the buyer.
pub fn pay(engine: &EscrowEngine, user: &str, record_id: &str, proof: &Path) -> Result<()> {
    let bytes = fs::read(proof)
        .with_context(|| format!("failed to read proof file {}", proof.display()))?;
    let name = file_name(proof)?;

    let txn = engine.submit_payment_proof(user, record_id, name, content_type(name), &bytes)?;
    println!("Payment proof recorded for {}", txn.transaction_id);
    print_transaction(&txn);
    Ok(())
}

/// Submit completed work files as the seller.
pub fn submit_work(
    engine: &EscrowEngine,
    user: &str,
    record_id: &str,
    paths: &[std::path::PathBuf],
    preview: Option<&str>,
) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read work file {}", path.display()))?;
        let name = file_name(path)?;
        files.push(WorkFile {
            name: name.to_string(),
            content_type: content_type(name).to_string(),
            bytes,
        });
    }

    let txn = engine.submit_work(user, record_id, &files, preview)?;
    println!(
        "Submitted {} work file(s) for {}",
        txn.work_files.len(),
        txn.transaction_id
    );
    print_transaction(&txn);
    Ok(())
}

/// Approve submitted work as the buyer.
pub fn approve(
    engine: &EscrowEngine,
    user: &str,
    record_id: &str,
    feedback: Option<&str>,
) -> Result<()> {
    let txn = engine.approve_work(user, record_id, feedback)?;
    println!("Approved work for {}; payment released", txn.transaction_id);
    print_transaction(&txn);
    Ok(())
}

/// File a dispute as the buyer.
pub fn dispute(engine: &EscrowEngine, user: &str, record_id: &str, reason: &str) -> Result<()> {
    let txn = engine.file_dispute(user, record_id, reason)?;
    println!("Dispute filed for {}", txn.transaction_id);
    print_transaction(&txn);
    Ok(())
}

/// Cancel a transaction.
pub fn cancel(engine: &EscrowEngine, user: &str, record_id: &str) -> Result<()> {
    let txn = engine.cancel_transaction(user, record_id)?;
    println!("Cancelled {}", txn.transaction_id);
    print_transaction(&txn);
    Ok(())
}

/// Poll a transaction until it reaches a terminal status.
pub fn watch(engine: &EscrowEngine, user: &str, record_id: &str) -> Result<()> {
    let txn = engine.fetch(user, record_id)?;
    let mut watcher = engine.watch(&txn);
    print_transaction(&txn);

    loop {
        match watcher.poll(engine.store()) {
            PollTick::Updated(updated) => {
                println!("-- update --");
                print_transaction(&updated);
            }
            PollTick::Unchanged => {}
            PollTick::Stopped(StopReason::Terminal(status)) => {
                println!("Transaction reached terminal status {status}; done");
                return Ok(());
            }
            PollTick::Stopped(StopReason::LocalOnly) => {
                println!("Transaction is session-local; nothing to watch");
                return Ok(());
            }
        }
        thread::sleep(watcher.interval());
    }
}

fn print_transaction(txn: &Transaction) {
    println!("Transaction:  {}", txn.transaction_id);
    println!("Record:       {}", txn.record_id);
    println!("Status:       {}", txn.status);
    println!("Buyer:        {}", txn.buyer_id);
    println!("Seller:       {}", txn.seller_id);
    println!("Amount:       {}", txn.amount);
    if let Some(post_id) = &txn.post_id {
        println!("Post:         {post_id}");
    }
    if let Some(description) = &txn.work_description {
        println!("Work:         {description}");
    }
    if let Some(proof) = &txn.payment_proof_url {
        println!("Proof:        {}", truncate(proof));
    }
    for file in &txn.work_files {
        println!("Work file:    {}", truncate(file));
    }
    if let Some(preview) = &txn.work_preview_url {
        println!("Preview:      {preview}");
    }
    if let Some(feedback) = &txn.buyer_feedback {
        println!("Feedback:     {feedback}");
    }
    if let Some(reason) = &txn.dispute_reason {
        println!("Dispute:      {reason}");
    }
    println!("Created:      {}", txn.created_at.to_rfc3339());
    println!("Updated:      {}", txn.updated_at.to_rfc3339());
    if txn.status.is_payment_phase() {
        println!("Pay before:   {}", txn.expires_at.to_rfc3339());
    }
    if let Some(released) = &txn.released_at {
        println!("Released:     {}", released.to_rfc3339());
    }
}

fn file_name(path: &Path) -> Result<&str> {
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => Ok(name),
        None => bail!("path {} has no usable file name", path.display()),
    }
}

/// Maps a file extension to a MIME type for upload.
fn content_type(file_name: &str) -> &'static str {
    match file_name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("pdf") => "application/pdf",
        Some("txt" | "md") => "text/plain",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Data URLs can be megabytes; keep the console readable.
fn truncate(reference: &str) -> String {
    const MAX: usize = 96;
    if reference.len() <= MAX {
        return reference.to_string();
    }
    // Back the cut up to a char boundary; references can carry
    // non-ASCII file names.
    let mut cut = MAX;
    while !reference.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... ({} bytes)", &reference[..cut], reference.len())
}

#[cfg(test)]
mod tests {
    use super::{content_type, truncate};

    #[test]
    fn test_truncate_cuts_on_char_boundaries() {
        let short = "work-files/rec-1-work-42-essay.pdf";
        assert_eq!(truncate(short), short);

        let long = format!("work-files/rec-1-work-42-{}", "résumé".repeat(30));
        let cut = truncate(&long);
        assert!(cut.ends_with(&format!("... ({} bytes)", long.len())));
        assert!(cut.len() < long.len());
    }

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(content_type("proof.png"), "image/png");
        assert_eq!(content_type("essay.pdf"), "application/pdf");
        assert_eq!(content_type("blob"), "application/octet-stream");
    }
}
