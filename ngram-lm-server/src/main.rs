use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, middleware, put, web};
use log::{error, info, warn};
use serde::Deserialize;

use ngram_lm_core::NgramError;
use ngram_lm_core::io::{WordStore, build_stores, list_files, data_folder};
use ngram_lm_core::model::ngram::format_ngram;
use ngram_lm_core::model::{AddDelta, GenerationInput, LengthSpec, Smoothing, Token};

const DATA_FOLDER: &str = "./data";
const DATA_EXTENSION: &str = "dat";
const DEFAULT_MAX_LENGTH: usize = 3;

/// Documents currently loaded, by name.
struct SharedData {
	documents: BTreeMap<String, WordStore>,
}

/// Smoothing selection carried by the model endpoints.
///
/// Query strings only carry text, so each endpoint keeps these as plain
/// fields and the strategy is rebuilt with [`Smoothing::from_parts`].
trait SmoothingQuery {
	fn name(&self) -> Option<&str>;
	fn delta(&self) -> Option<f64>;
	fn threshold(&self) -> Option<usize>;
	fn vocabulary_size(&self) -> Option<usize>;

	fn smoothing(&self) -> Result<Smoothing, NgramError> {
		match self.name() {
			None => Ok(Smoothing::default()),
			Some(name) => Smoothing::from_parts(name, self.delta(), self.threshold(), self.vocabulary_size()),
		}
	}
}

macro_rules! smoothing_query {
	($($params:ty),*) => {$(
		impl SmoothingQuery for $params {
			fn name(&self) -> Option<&str> {
				self.smoothing.as_deref()
			}
			fn delta(&self) -> Option<f64> {
				self.delta
			}
			fn threshold(&self) -> Option<usize> {
				self.threshold
			}
			fn vocabulary_size(&self) -> Option<usize> {
				self.vocabulary_size
			}
		}
	)*};
}

smoothing_query!(ProbabilityParams, SentenceParams, GenerateParams);

#[derive(Deserialize)]
struct DocumentsQuery {
	names: Option<String>,
	max_length: Option<usize>,
}

#[derive(Deserialize)]
struct ProbabilityParams {
	document: String,
	ngram: String,
	given: Option<String>,
	smoothing: Option<String>,
	delta: Option<f64>,
	threshold: Option<usize>,
	vocabulary_size: Option<usize>,
}

#[derive(Deserialize)]
struct SentenceParams {
	document: String,
	sentence: String,
	length: Option<usize>,
	log: Option<bool>,
	smoothing: Option<String>,
	delta: Option<f64>,
	threshold: Option<usize>,
	vocabulary_size: Option<usize>,
}

#[derive(Deserialize)]
struct GenerateParams {
	document: String,
	length: Option<usize>,
	proper_prefix: Option<bool>,
	seed: Option<u64>,
	max_length: Option<usize>,
	count: Option<usize>,
	smoothing: Option<String>,
	delta: Option<f64>,
	threshold: Option<usize>,
	vocabulary_size: Option<usize>,
}

#[derive(Deserialize)]
struct HasSentenceParams {
	document: String,
	sentence: String,
	length: Option<usize>,
}

#[derive(Deserialize)]
struct CommonParams {
	left: String,
	right: String,
	length: Option<usize>,
}

/// Maps a library error to a response.
///
/// - 400: malformed query (length, parameter)
/// - 422: valid query without an answer for this document
/// - 500: I/O and snapshot failures
fn error_response(e: NgramError) -> HttpResponse {
	if e.is_caller_error() {
		HttpResponse::BadRequest().body(e.to_string())
	} else if e.is_data_error() {
		warn!("unanswerable query: {e}");
		HttpResponse::UnprocessableEntity().body(e.to_string())
	} else {
		error!("request failed: {e}");
		HttpResponse::InternalServerError().body(e.to_string())
	}
}

fn lock(data: &web::Data<Mutex<SharedData>>) -> Result<MutexGuard<'_, SharedData>, HttpResponse> {
	data.lock()
		.map_err(|_| HttpResponse::InternalServerError().body("Document lock failed"))
}

fn document<'a>(shared: &'a mut SharedData, name: &str) -> Result<&'a mut WordStore, HttpResponse> {
	shared
		.documents
		.get_mut(name)
		.ok_or_else(|| HttpResponse::NotFound().body(format!("Document '{name}' is not loaded")))
}

fn parse_tokens(text: &str, what: &str) -> Result<Vec<Token<String>>, HttpResponse> {
	let tokens = Token::parse_all(text);
	if tokens.is_empty() {
		return Err(HttpResponse::BadRequest().body(format!("Missing or empty {what}")));
	}
	Ok(tokens)
}

/// HTTP GET endpoint `/v1/documents`
///
/// Lists the corpus files available in the data folder.
#[get("/v1/documents")]
async fn get_documents() -> impl Responder {
	match list_files(data_folder(DATA_FOLDER), DATA_EXTENSION) {
		Ok(files) => HttpResponse::Ok().body(files.join("\n").replace(".dat", "")),
		Err(_) => HttpResponse::InternalServerError().body("Failed to list documents"),
	}
}

#[get("/v1/loaded_documents")]
async fn get_loaded_documents(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match lock(&data) {
		Ok(s) => s,
		Err(response) => return response,
	};
	let names: Vec<&str> = shared_data.documents.keys().map(String::as_str).collect();
	HttpResponse::Ok().body(names.join("\n"))
}

/// HTTP PUT endpoint `/v1/load_documents`
///
/// Replaces the loaded documents with `names` (comma-separated), counting
/// n-grams up to `max_length`. Documents are built in parallel.
#[put("/v1/load_documents")]
async fn put_documents(data: web::Data<Mutex<SharedData>>, query: web::Query<DocumentsQuery>) -> impl Responder {
	let query_names = match &query.names {
		Some(s) if !s.trim().is_empty() => s.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty document name"),
	};

	let paths: Vec<PathBuf> = query_names
		.split(',')
		.map(|s| s.trim())
		.filter(|s| !s.is_empty())
		.map(|name| data_folder(DATA_FOLDER).join(format!("{name}.{DATA_EXTENSION}")))
		.collect();
	let spec = LengthSpec::UpTo(query.max_length.unwrap_or(DEFAULT_MAX_LENGTH));

	let stores = match build_stores(&paths, &spec) {
		Ok(stores) => stores,
		Err(e) => return error_response(e),
	};

	let mut shared_data = match lock(&data) {
		Ok(s) => s,
		Err(response) => return response,
	};
	shared_data.documents = stores.into_iter().collect();
	info!("loaded documents: {:?}", shared_data.documents.keys().collect::<Vec<_>>());

	HttpResponse::Ok().body("Documents loaded successfully")
}

/// Lengths a conditional probability query reads: the context, the
/// continuation and both joined.
fn query_lengths(given: usize, ngram: usize) -> Vec<usize> {
	let mut lengths = vec![given, ngram, given + ngram];
	lengths.retain(|&l| l > 0);
	lengths.sort_unstable();
	lengths.dedup();
	lengths
}

/// HTTP GET endpoint `/v1/probability`
///
/// Probability of `ngram`, or of `ngram` following `given` when present.
/// With add-delta smoothing, an explicit `vocabulary_size` overrides the
/// observed one.
#[get("/v1/probability")]
async fn get_probability(data: web::Data<Mutex<SharedData>>, query: web::Query<ProbabilityParams>) -> impl Responder {
	let ngram = match parse_tokens(&query.ngram, "ngram") {
		Ok(t) => t,
		Err(response) => return response,
	};
	let given = query.given.as_deref().map(Token::parse_all).unwrap_or_default();
	let smoothing = match query.smoothing() {
		Ok(s) => s,
		Err(e) => return error_response(e),
	};

	let mut shared_data = match lock(&data) {
		Ok(s) => s,
		Err(response) => return response,
	};
	let store = match document(&mut shared_data, &query.document) {
		Ok(s) => s,
		Err(response) => return response,
	};
	if let Err(e) = store.materialize_up_to(given.len() + ngram.len()) {
		return error_response(e);
	}
	let store = &*store;

	let probability = match (&smoothing, query.vocabulary_size) {
		(Smoothing::AddDelta { delta }, Some(vocabulary)) if given.is_empty() => {
			AddDelta::new(store, *delta).and_then(|model| model.ngram_probability_with_vocabulary(&ngram, vocabulary))
		}
		_ => {
			let lengths = query_lengths(given.len(), ngram.len());
			smoothing
				.build_for(store, &lengths)
				.and_then(|model| model.probability_given(&given, &ngram))
		}
	};
	match probability {
		Ok(p) => HttpResponse::Ok().body(p.to_string()),
		Err(e) => error_response(e),
	}
}

/// HTTP GET endpoint `/v1/sentence_probability`
///
/// Probability (natural log with `log=true`) of `sentence` with contexts of
/// at most `length - 1` tokens.
#[get("/v1/sentence_probability")]
async fn get_sentence_probability(
	data: web::Data<Mutex<SharedData>>,
	query: web::Query<SentenceParams>,
) -> impl Responder {
	let sentence = Token::parse_all(&query.sentence);
	let length = query.length.unwrap_or(DEFAULT_MAX_LENGTH);
	let smoothing = match query.smoothing() {
		Ok(s) => s,
		Err(e) => return error_response(e),
	};

	let mut shared_data = match lock(&data) {
		Ok(s) => s,
		Err(response) => return response,
	};
	let store = match document(&mut shared_data, &query.document) {
		Ok(s) => s,
		Err(response) => return response,
	};
	if let Err(e) = store.materialize_up_to(length) {
		return error_response(e);
	}

	let lengths: Vec<usize> = (1..=length).collect();
	let result = smoothing.build_for(&*store, &lengths).and_then(|model| {
		if query.log.unwrap_or(false) {
			model.log_sentence_probability(length, &sentence)
		} else {
			model.sentence_probability(length, &sentence)
		}
	});
	match result {
		Ok(p) => HttpResponse::Ok().body(p.to_string()),
		Err(e) => error_response(e),
	}
}

/// HTTP GET endpoint `/v1/generate`
///
/// Generates `count` sentences (one per line), each ending with `<END>`.
#[get("/v1/generate")]
async fn get_generated(data: web::Data<Mutex<SharedData>>, query: web::Query<GenerateParams>) -> impl Responder {
	let mut input = match GenerationInput::new(query.length.unwrap_or(DEFAULT_MAX_LENGTH)) {
		Ok(i) => i,
		Err(e) => return error_response(e),
	};
	input.proper_prefix = query.proper_prefix.unwrap_or(true);
	input.seed = query.seed;
	input.max_length = query.max_length;
	let smoothing = match query.smoothing() {
		Ok(s) => s,
		Err(e) => return error_response(e),
	};

	let mut shared_data = match lock(&data) {
		Ok(s) => s,
		Err(response) => return response,
	};
	let store = match document(&mut shared_data, &query.document) {
		Ok(s) => s,
		Err(response) => return response,
	};
	if let Err(e) = input.prepare(store) {
		return error_response(e);
	}

	let sentences = smoothing
		.build_for(&*store, &input.lengths())
		.and_then(|model| input.generate(&*model, query.count.unwrap_or(1)));
	match sentences {
		Ok(sentences) => {
			let lines: Vec<String> = sentences.iter().map(|s| format_ngram(s)).collect();
			HttpResponse::Ok().body(lines.join("\n"))
		}
		Err(e) => error_response(e),
	}
}

/// HTTP GET endpoint `/v1/has_sentence`
///
/// `true` if every trailing window (at most `length` tokens) of `sentence`
/// occurs in the document.
#[get("/v1/has_sentence")]
async fn get_has_sentence(
	data: web::Data<Mutex<SharedData>>,
	query: web::Query<HasSentenceParams>,
) -> impl Responder {
	let sentence = Token::parse_all(&query.sentence);
	let length = query.length.unwrap_or(DEFAULT_MAX_LENGTH);

	let mut shared_data = match lock(&data) {
		Ok(s) => s,
		Err(response) => return response,
	};
	let store = match document(&mut shared_data, &query.document) {
		Ok(s) => s,
		Err(response) => return response,
	};
	let contained = store
		.materialize_up_to(length)
		.and_then(|_| store.contains_sequence(length, &sentence));
	match contained {
		Ok(found) => HttpResponse::Ok().body(found.to_string()),
		Err(e) => error_response(e),
	}
}

/// HTTP GET endpoint `/v1/common`
///
/// Number of distinct n-grams of `length` shared by two documents, followed
/// by those n-grams (one per line, sorted).
#[get("/v1/common")]
async fn get_common(data: web::Data<Mutex<SharedData>>, query: web::Query<CommonParams>) -> impl Responder {
	let length = query.length.unwrap_or(DEFAULT_MAX_LENGTH);

	let mut shared_data = match lock(&data) {
		Ok(s) => s,
		Err(response) => return response,
	};
	for name in [&query.left, &query.right] {
		let store = match document(&mut shared_data, name) {
			Ok(s) => s,
			Err(response) => return response,
		};
		if let Err(e) = store.materialize(&[length]) {
			return error_response(e);
		}
	}

	let (Some(left), Some(right)) = (
		shared_data.documents.get(&query.left),
		shared_data.documents.get(&query.right),
	) else {
		return HttpResponse::NotFound().body("Document is not loaded");
	};
	match left.find_common(length, right) {
		Ok(common) => {
			let mut lines: Vec<String> = common.iter().map(|ngram| format_ngram(ngram)).collect();
			lines.sort();
			lines.insert(0, common.len().to_string());
			HttpResponse::Ok().body(lines.join("\n"))
		}
		Err(e) => error_response(e),
	}
}

/// Main entry point for the server.
///
/// Starts with no document loaded; documents are loaded from `./data`
/// with `PUT /v1/load_documents`.
///
/// # Notes
/// - The server binds to 127.0.0.1:5000.
/// - Log level defaults to `info` and follows `RUST_LOG`.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let shared_data = SharedData {
		documents: BTreeMap::new(),
	};
	let shared_documents = web::Data::new(Mutex::new(shared_data));

	info!("serving documents from {DATA_FOLDER} on 127.0.0.1:5000");
	HttpServer::new(move || {
		App::new()
			.wrap(Cors::permissive())
			.wrap(middleware::Logger::default())
			.app_data(shared_documents.clone())
			.service(get_documents)
			.service(get_loaded_documents)
			.service(put_documents)
			.service(get_probability)
			.service(get_sentence_probability)
			.service(get_generated)
			.service(get_has_sentence)
			.service(get_common)
	})
	.bind(("127.0.0.1", 5000))?
	.run()
	.await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn probability_reads_context_continuation_and_both() {
		assert_eq!(query_lengths(0, 1), vec![1]);
		assert_eq!(query_lengths(1, 1), vec![1, 2]);
		assert_eq!(query_lengths(2, 1), vec![1, 2, 3]);
	}
}
