use crate::{Field, TokenMode};
use localml_util::tokenizer::{fold_case, Tokenizer};
use std::collections::BTreeMap;

/**
Count how many times `term`, or any of its forms declared by `field`, occurs in `text`.

In `full_terms_only` mode the whole text must equal the term. In `all` mode a text equal to the term counts once, otherwise the term is counted as a token sequence. In `tokens_only` mode only token sequences are counted.
*/
pub fn term_matches(text: &str, term: &str, field: &Field) -> u64 {
	let case_sensitive = field.term_analysis.case_sensitive;
	let forms = field.term_forms(term);
	let folded_text = fold_case(text.trim(), case_sensitive);
	let full_term_match = forms
		.iter()
		.any(|form| fold_case(form, case_sensitive) == folded_text);
	match field.term_analysis.token_mode {
		TokenMode::FullTermsOnly => full_term_match as u64,
		TokenMode::All if full_term_match => 1,
		TokenMode::All | TokenMode::TokensOnly => {
			let tokens = Tokenizer::new(text, case_sensitive).collect::<Vec<_>>();
			forms
				.iter()
				.map(|form| {
					let form_tokens = Tokenizer::new(form, case_sensitive).collect::<Vec<_>>();
					if form_tokens.is_empty() || form_tokens.len() > tokens.len() {
						return 0;
					}
					tokens
						.windows(form_tokens.len())
						.filter(|window| *window == form_tokens.as_slice())
						.count() as u64
				})
				.sum()
		}
	}
}

/// Count how many of the separated items in `text` equal `item`.
pub fn item_matches(text: &str, item: &str, field: &Field) -> u64 {
	split_items(text, &field.item_separator)
		.filter(|candidate| *candidate == item)
		.count() as u64
}

fn split_items<'a>(text: &'a str, separator: &'a str) -> impl Iterator<Item = &'a str> {
	let separator = if separator.is_empty() { "," } else { separator };
	text.split(separator)
		.map(|item| item.trim())
		.filter(|item| !item.is_empty())
}

impl Field {
	/**
	The terms of `text` that this field knows about, with their number of occurrences. Text fields match terms against the tag cloud, mapping other term forms to their canonical term. Items fields match against the item list. Terms are returned in the order they first appear.
	*/
	pub fn unique_terms(&self, text: &str) -> Vec<(String, u64)> {
		let case_sensitive = self.term_analysis.case_sensitive;
		let candidates: Vec<String> = match self.optype {
			crate::Optype::Items => split_items(text, &self.item_separator)
				.map(|item| item.to_owned())
				.collect(),
			_ => {
				let mut terms = Vec::new();
				if self.term_analysis.token_mode != TokenMode::FullTermsOnly {
					terms.extend(Tokenizer::new(text, case_sensitive).map(|token| token.into_owned()));
				}
				if self.term_analysis.token_mode != TokenMode::TokensOnly {
					terms.push(fold_case(text.trim(), case_sensitive).into_owned());
				}
				terms
			}
		};
		let known: &[String] = match self.optype {
			crate::Optype::Items => &self.summary.items,
			_ => &self.summary.tag_cloud,
		};
		let mut canonical_forms = BTreeMap::new();
		for (term, forms) in self.summary.term_forms.iter() {
			for form in forms.iter() {
				canonical_forms.insert(form.as_str(), term.as_str());
			}
		}
		let mut unique_terms: Vec<(String, u64)> = Vec::new();
		for candidate in candidates.iter() {
			let term = if known.iter().any(|known| known == candidate) {
				candidate.as_str()
			} else if let Some(term) = canonical_forms.get(candidate.as_str()) {
				term
			} else {
				continue;
			};
			match unique_terms.iter_mut().find(|(existing, _)| existing == term) {
				Some((_, count)) => *count += 1,
				None => unique_terms.push((term.to_owned(), 1)),
			}
		}
		unique_terms
	}
}

#[cfg(test)]
fn text_field(token_mode: TokenMode) -> Field {
	let mut field = Field::new("000001", "review", crate::Optype::Text);
	field.term_analysis.token_mode = token_mode;
	field.summary.tag_cloud = vec!["great".to_owned(), "bad".to_owned(), "great movie".to_owned()];
	field
		.summary
		.term_forms
		.insert("great".to_owned(), vec!["greatest".to_owned()]);
	field
}

#[test]
fn test_term_matches() {
	let field = text_field(TokenMode::All);
	assert_eq!(term_matches("A great, GREAT movie", "great", &field), 2);
	assert_eq!(term_matches("the greatest", "great", &field), 1);
	assert_eq!(term_matches("a great movie indeed", "great movie", &field), 1);
	assert_eq!(term_matches("Bad", "bad", &field), 1);
	assert_eq!(term_matches("nothing here", "bad", &field), 0);
	let field = text_field(TokenMode::FullTermsOnly);
	assert_eq!(term_matches("great", "great", &field), 1);
	assert_eq!(term_matches("great movie", "great", &field), 0);
}

#[test]
fn test_item_matches() {
	let mut field = Field::new("000002", "tags", crate::Optype::Items);
	field.item_separator = ";".to_owned();
	assert_eq!(item_matches("milk; bread ;eggs", "bread", &field), 1);
	assert_eq!(item_matches("milk;bread", "butter", &field), 0);
}

#[test]
fn test_unique_terms() {
	let field = text_field(TokenMode::All);
	assert_eq!(
		field.unique_terms("Great movie, the greatest! bad bad"),
		vec![("great".to_owned(), 2), ("bad".to_owned(), 2)]
	);
	let field = text_field(TokenMode::FullTermsOnly);
	assert_eq!(
		field.unique_terms("Great Movie"),
		vec![("great movie".to_owned(), 1)]
	);
}
