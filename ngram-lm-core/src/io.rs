use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::{env, fs, io};

use log::{debug, info, warn};

use crate::error::{NgramError, Result};
use crate::model::store::{LengthSpec, NgramStore};
use crate::model::token::Token;

/// Extension of the binary snapshot written next to a corpus file.
pub const SNAPSHOT_EXTENSION: &str = "bin";

/// Word-level store built from a text corpus.
pub type WordStore = NgramStore<Token<String>>;

/// Splits a text into tokens.
///
/// - One sentence per line
/// - Words are separated by whitespace
/// - An end-of-sequence token follows every non-empty line
/// - The literal `<END>` is read as an end-of-sequence token
pub fn tokenize(text: &str) -> Vec<Token<String>> {
	let mut tokens = Vec::new();
	for line in text.lines() {
		let before = tokens.len();
		tokens.extend(line.split_whitespace().map(Token::parse));
		if tokens.len() > before && tokens.last() != Some(&Token::Eos) {
			tokens.push(Token::Eos);
		}
	}
	tokens
}

/// Reads a text file and tokenizes it (see [`tokenize`]).
pub fn read_tokens<P: AsRef<Path>>(filename: P) -> io::Result<Vec<Token<String>>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(tokenize(&contents))
}

/// Snapshot file of a corpus: same folder and stem, [`SNAPSHOT_EXTENSION`].
///
/// `data/novel.dat` has its snapshot in `data/novel.bin`.
///
/// # Errors
/// Returns an `InvalidInput` I/O error if `corpus` has no file name.
pub fn snapshot_path<P: AsRef<Path>>(corpus: P) -> Result<PathBuf> {
	let corpus = corpus.as_ref();
	if corpus.file_stem().is_none() {
		return Err(no_file_name(corpus));
	}
	Ok(corpus.with_extension(SNAPSHOT_EXTENSION))
}

/// Name a corpus is served under: its file stem (`data/novel.dat` is `novel`).
///
/// # Errors
/// Returns an `InvalidInput` I/O error if `corpus` has no file name.
pub fn document_name<P: AsRef<Path>>(corpus: P) -> Result<String> {
	let corpus = corpus.as_ref();
	corpus
		.file_stem()
		.map(|stem| stem.to_string_lossy().into_owned())
		.ok_or_else(|| no_file_name(corpus))
}

fn no_file_name(path: &Path) -> NgramError {
	NgramError::Io(io::Error::new(
		io::ErrorKind::InvalidInput,
		format!("corpus path '{}' has no file name", path.display()),
	))
}

/// Folder corpus files are listed from.
///
/// `"."` and `"./"` resolve to the working directory so logged paths are
/// absolute; any other folder is kept relative.
pub fn data_folder(input: &str) -> PathBuf {
	match input {
		"." | "./" => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
		other => PathBuf::from(other),
	}
}

/// Names of the corpus files of `dir` with `extension`, sorted.
///
/// Sub-folders are skipped, even when their name matches.
pub fn list_files<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<String>> {
	let mut files = Vec::new();

	for entry in fs::read_dir(dir)? {
		let path = entry?.path();
		if path.is_file() && path.extension() == Some(std::ffi::OsStr::new(extension)) {
			if let Some(name) = path.file_name() {
				files.push(name.to_string_lossy().to_string());
			}
		}
	}
	files.sort();

	Ok(files)
}

/// Loads the store of a corpus file, using its snapshot when possible.
///
/// - If `<stem>.bin` exists beside the corpus and is not older than it,
///   the store is decoded from it with `postcard`.
/// - Otherwise (missing, stale or unreadable snapshot) the corpus is read,
///   tokenized and counted, and the snapshot is (re)written.
/// - Lengths of `spec` missing from a loaded snapshot are materialized and
///   the snapshot is refreshed.
///
/// # Errors
/// Returns an error if the corpus cannot be read, `spec` is invalid or the
/// snapshot cannot be written.
pub fn load_or_build<P: AsRef<Path>>(path: P, spec: &LengthSpec) -> Result<WordStore> {
	let path = path.as_ref();
	let lengths = spec.lengths()?;
	let snapshot_path = snapshot_path(path)?;

	if let Some(mut store) = read_snapshot(path, &snapshot_path) {
		let missing = lengths.iter().any(|length| !store.lengths().any(|l| l == *length));
		if missing {
			store.materialize(&lengths)?;
			write_snapshot(&store, &snapshot_path)?;
			debug!("materialized missing lengths of {}", snapshot_path.display());
		}
		return Ok(store);
	}

	let store = NgramStore::new(read_tokens(path)?, spec)?;
	write_snapshot(&store, &snapshot_path)?;
	info!(
		"built {} ({} tokens, lengths {:?}) and wrote {}",
		path.display(),
		store.num_tokens(),
		lengths,
		snapshot_path.display()
	);
	Ok(store)
}

fn read_snapshot(corpus_path: &Path, snapshot_path: &Path) -> Option<WordStore> {
	if !snapshot_path.exists() {
		return None;
	}
	if is_older(snapshot_path, corpus_path) {
		warn!("snapshot {} is older than its corpus, rebuilding", snapshot_path.display());
		return None;
	}

	let decoded = fs::read(snapshot_path)
		.map_err(NgramError::from)
		.and_then(|bytes| postcard::from_bytes::<WordStore>(&bytes).map_err(NgramError::from));
	match decoded {
		Ok(store) => {
			info!("loaded snapshot {} ({} tokens)", snapshot_path.display(), store.num_tokens());
			Some(store)
		}
		Err(e) => {
			warn!("unreadable snapshot {} ({e}), rebuilding", snapshot_path.display());
			None
		}
	}
}

fn write_snapshot(store: &WordStore, snapshot_path: &Path) -> Result<()> {
	let bytes = postcard::to_stdvec(store)?;
	fs::write(snapshot_path, bytes)?;
	Ok(())
}

/// True if `path` was modified before `reference`. Unknown times are not older.
fn is_older(path: &Path, reference: &Path) -> bool {
	let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
	match (modified(path), modified(reference)) {
		(Some(a), Some(b)) => a < b,
		_ => false,
	}
}

/// Builds the stores of several corpus files in parallel.
///
/// Documents are spread over at most `num_cpus` worker threads; each store
/// is built by exactly one worker (see [`load_or_build`]) and sent back over
/// a channel. Results are named after the file stem and returned in input
/// order.
///
/// # Errors
/// Returns the first error (in input order) met by any worker.
pub fn build_stores<P: AsRef<Path>>(paths: &[P], spec: &LengthSpec) -> Result<Vec<(String, WordStore)>> {
	if paths.is_empty() {
		return Ok(Vec::new());
	}
	spec.lengths()?;

	let workers = num_cpus::get().clamp(1, paths.len());
	let mut batches: Vec<Vec<(usize, PathBuf)>> = vec![Vec::new(); workers];
	for (index, path) in paths.iter().enumerate() {
		batches[index % workers].push((index, path.as_ref().to_path_buf()));
	}
	debug!("building {} documents on {} workers", paths.len(), workers);

	let (tx, rx) = mpsc::channel();
	for batch in batches {
		let tx = tx.clone();
		let spec = spec.clone();

		thread::spawn(move || {
			for (index, path) in batch {
				let result = document_name(&path).and_then(|name| load_or_build(&path, &spec).map(|store| (name, store)));
				// The receiver only disappears if the caller is gone
				if tx.send((index, result)).is_err() {
					return;
				}
			}
		});
	}
	drop(tx);

	let mut results: Vec<Option<Result<(String, WordStore)>>> = (0..paths.len()).map(|_| None).collect();
	for (index, result) in rx.iter() {
		results[index] = Some(result);
	}

	results
		.into_iter()
		.enumerate()
		.map(|(index, result)| {
			result.unwrap_or_else(|| {
				Err(NgramError::Io(io::Error::other(format!(
					"worker stopped before building document {index}"
				))))
			})
		})
		.collect()
}
