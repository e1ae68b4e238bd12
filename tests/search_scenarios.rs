mod common;

use std::time::Duration;

use common::{headwords, sample_dictionary};
use hanzigloss_rs::{
    MatchSpan, Pattern, SearchConfig, SearchFlags, SearchQuery, SearchService, SessionState, SharedDictionary,
    find_direct, search_snapshot,
};

const WAIT: Duration = Duration::from_secs(10);

fn search(query: &str) -> Vec<String> {
    let snapshot = sample_dictionary();
    let hits = search_snapshot(&snapshot, query, &SearchConfig::default());
    headwords(&snapshot, hits.into_iter().map(|hit| hit.index))
}

#[test]
fn eat_ranks_words_that_mean_to_eat() {
    // longer glosses such as "to eat a meal" fall outside the length window
    assert_eq!(search("eat"), vec!["吃", "食"]);
}

#[test]
fn every_term_counts_towards_the_match() {
    let results = search("eat meal");
    assert_eq!(results.first().map(String::as_str), Some("用饭"));
    assert!(results.contains(&"吃".to_string()));
}

#[test]
fn toneless_pinyin_finds_the_word() {
    let results = search("zhongguo");
    assert_eq!(results.first().map(String::as_str), Some("中国"));
    assert!(results.contains(&"中国人".to_string()));
}

#[test]
fn separated_syllables_find_the_word() {
    let results = search("zhong guo");
    assert_eq!(results.first().map(String::as_str), Some("中国"));
    assert!(results.contains(&"中国人".to_string()));
    assert!(!results.contains(&"国".to_string()));
    assert!(!results.contains(&"国人".to_string()));
}

#[test]
fn punctuation_only_query_is_empty() {
    assert!(SearchQuery::parse(" ... ,, ").is_empty());
    assert!(search(" ... ,, ").is_empty());
    assert!(search("。，").is_empty());
}

#[test]
fn hanzi_query_prefers_the_exact_word() {
    let results = search("中国");
    assert_eq!(results.first().map(String::as_str), Some("中国"));
    assert!(results.contains(&"中".to_string()));
    assert!(results.contains(&"国".to_string()));
    assert!(results.contains(&"中国人".to_string()));
}

#[test]
fn traditional_spelling_is_searchable() {
    assert_eq!(search("中國").first().map(String::as_str), Some("中国"));
}

#[test]
fn english_place_names_match_case_insensitively() {
    // 伤害 only shares the toneless pinyin, 上海 also matches its translation
    assert_eq!(search("shanghai"), vec!["上海", "伤害"]);
}

#[test]
fn matcher_examples() {
    let plain = Pattern::new("abcabcdef", SearchFlags::NONE);
    assert_eq!(plain.find("abcabcabcdef"), MatchSpan::new(3, 12));
    assert!(!plain.find("abcabcadbcdef").is_found());

    let airport = "Pudong Airport (Shanghai)";
    assert_eq!(
        Pattern::new("shanghai", SearchFlags::IGNORE_CASE).find(airport),
        MatchSpan::new(16, 24)
    );

    let pinyin = SearchFlags::IGNORE_CASE | SearchFlags::IGNORE_DIACRITICS | SearchFlags::IGNORE_NON_LETTER;
    let subject = "shàng hǎi";
    let span = Pattern::new("shanghai", pinyin).find(subject);
    assert_eq!(span.char_range(subject), 0..9);
    assert_eq!(find_direct("shanghai", subject, pinyin), span);
}

#[test]
fn exact_gloss_outranks_a_longer_one() {
    let snapshot = sample_dictionary();
    let query = SearchQuery::parse("airport");
    let exact = query.score(snapshot.find("机场").unwrap());
    let longer = query.score(snapshot.find("浦东机场").unwrap());
    assert!(exact > longer);
    assert_eq!(search("airport"), vec!["机场"]);
}

#[test]
fn service_matches_the_synchronous_path() {
    let snapshot = sample_dictionary();
    let expected = search_snapshot(&snapshot, "to eat", &SearchConfig::default());

    let mut service = SearchService::new(SharedDictionary::with_snapshot(snapshot), SearchConfig::default());
    service.start().unwrap();
    let results = service.search("to eat", WAIT).unwrap();
    assert_eq!(results.hits, expected);
    assert_eq!(service.status(), SessionState::Delivered);
}

#[test]
fn superseded_queries_are_never_delivered() {
    let mut service = SearchService::new(
        SharedDictionary::with_snapshot(sample_dictionary()),
        SearchConfig::default(),
    );
    service.start().unwrap();
    let slot = service.results();

    for round in 0..20 {
        let older = service.submit("eat");
        let newer = service.submit("airport");
        assert!(newer > older);
        let results = slot.wait(WAIT).expect("results delivered");
        assert_eq!(results.request, newer, "round {round} delivered a stale query");
        assert_eq!(results.query, "airport");
    }
}
