use log::info;

use ngram_lm_core::NgramError;
use ngram_lm_core::io::{load_or_build, tokenize};
use ngram_lm_core::model::good_turing::GoodTuring;
use ngram_lm_core::model::ngram::format_ngram;
use ngram_lm_core::model::{
    AddDelta, GenerationInput, LanguageModel, LengthSpec, MaximumLikelihood, NgramStore, SentenceSampler, Smoothing,
    Token,
};

const CORPUS: &str = "the cat sat on the mat
the dog sat on the rug
a cat ran after the dog
the dog ran away
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Count unigrams and bigrams of a corpus file given as argument
    // (a .bin snapshot is written beside it), or of the inline corpus
    let mut store = match std::env::args().nth(1) {
        Some(path) => load_or_build(path, &LengthSpec::UpTo(2))?,
        None => NgramStore::new(tokenize(CORPUS), &LengthSpec::UpTo(2))?,
    };
    info!("{} tokens, {} distinct words", store.num_tokens(), store.num_distinct(1)?);

    // Trigrams are counted on demand
    store.materialize(&[3])?;

    let the_dog = Token::parse_all("the dog");
    println!("count(the dog) = {}", store.count(&the_dog));

    // Length 4 was never materialized: counts read 0, models refuse it
    let long = Token::parse_all("the dog sat on");
    println!("count(the dog sat on) = {} (not materialized)", store.count(&long));

    // Maximum likelihood
    let ml = MaximumLikelihood::new(&store);
    match ml.ngram_probability(&long) {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("{e}"),
    }
    let sentence = Token::parse_all("the dog sat on the mat <END>");
    println!("ML P(the dog) = {}", ml.ngram_probability(&the_dog)?);
    println!("ML P(sentence | bigrams) = {}", ml.sentence_probability(2, &sentence)?);

    // "ran on" never occurs, so its log is refused
    let unseen = Token::parse_all("the cat ran on the mat");
    match ml.log_sentence_probability(2, &unseen) {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("{e}"),
    }

    // Add-delta gives every n-gram a positive probability
    let mut laplace = AddDelta::new(&store, 1.0)?;
    println!("AD log P(the cat ran on the mat) = {}", laplace.log_sentence_probability(2, &unseen)?);
    laplace.set_delta(0.1)?;
    println!(
        "AD(0.1) P(the cat | V = 1000) = {}",
        laplace.ngram_probability_with_vocabulary(&Token::parse_all("the cat"), 1000)?
    );
    match laplace.set_delta(0.0) {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("{e}"),
    }

    // Good-Turing: no bigram is seen 4 times here,
    // so a threshold of 4 cannot be smoothed
    match GoodTuring::with_smoothed_tables(&store, 4, store.num_distinct(1)?) {
        Ok(_) => println!("Should not happen"),
        Err(e @ NgramError::UndefinedSmoothing { .. }) => println!("{e}"),
        Err(e) => return Err(e.into()),
    }
    let good_turing = GoodTuring::with_smoothed_tables(&store, 2, store.num_distinct(1)?)?;
    println!("GT unseen unigram mass = {:?}", good_turing.smoothed_table(1).and_then(|t| t.get(0)));
    // Every observed word is seen, so unseen words need the full vocabulary size
    let open_vocabulary = GoodTuring::with_smoothed_tables(&store, 2, 1000)?;
    println!("GT P(unseen word | V = 1000) = {}", open_vocabulary.unseen_ngram_probability(1)?);
    println!("GT P(sentence | bigrams) = {}", good_turing.sentence_probability(2, &sentence)?);

    // The same strategies, selected from configuration values
    for name in ["ml", "ad", "gt"] {
        let smoothing = Smoothing::from_parts(name, Some(0.5), Some(2), None)?;
        let model = smoothing.build(&store)?;
        println!("{} P(the dog) = {}", model.name(), model.ngram_probability(&the_dog)?);
    }

    // Generate sentences from trigrams, starting like a corpus sentence
    let mut input = GenerationInput::new(3)?;
    input.seed = Some(7);
    input.max_length = Some(100);
    input.prepare(&mut store)?;
    let ml = MaximumLikelihood::new(&store);
    for (i, sentence) in input.generate(&ml, 5)?.iter().enumerate() {
        println!("Generated sentence {}: {}", i + 1, format_ngram(sentence));
    }

    // A sampler can also be driven directly
    let mut sampler = SentenceSampler::seeded(42);
    let sentence = ml.generate_sentence(&mut sampler, 2, false)?;
    println!("Bigram sentence: {} (in corpus: {})", format_ngram(&sentence), store.contains_sequence(2, &sentence)?);

    Ok(())
}
