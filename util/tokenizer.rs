/*!
Text fields are matched against model terms token by token. This module provides the tokenizer used for term predicates, logistic regression tag clouds, cluster term sets, and topic models.
*/

use std::borrow::Cow;

/**
A `Tokenizer` splits text into runs of adjacent alphanumeric characters. Unless the tokenizer is case sensitive, tokens are lowercased.

# Example

| text            | tokens                      |
|-----------------|-----------------------------|
| Don't           | ["don", "t"]                |
| $50             | ["50"]                      |
| 50(hello)       | ["50", "hello"]             |
| CEO/Co-founder  | ["ceo", "co", "founder"]    |
*/
#[derive(Clone, Debug)]
pub struct Tokenizer<'a> {
	text: &'a str,
	byte_index: usize,
	case_sensitive: bool,
}

impl<'a> Tokenizer<'a> {
	pub fn new(text: &'a str, case_sensitive: bool) -> Self {
		Self {
			text,
			byte_index: 0,
			case_sensitive,
		}
	}
}

impl<'a> Iterator for Tokenizer<'a> {
	type Item = Cow<'a, str>;
	fn next(&mut self) -> Option<Self::Item> {
		// Skip to the start of the next token.
		loop {
			let next_char = self.text[self.byte_index..].chars().next()?;
			if next_char.is_alphanumeric() {
				break;
			}
			self.byte_index += next_char.len_utf8();
		}
		let start = self.byte_index;
		let mut contains_capital_letter = false;
		while let Some(next_char) = self.text[self.byte_index..].chars().next() {
			if !next_char.is_alphanumeric() {
				break;
			}
			if next_char.is_uppercase() {
				contains_capital_letter = true;
			}
			self.byte_index += next_char.len_utf8();
		}
		let token = &self.text[start..self.byte_index];
		// Only allocate when lowercasing actually changes the token.
		let token = if contains_capital_letter && !self.case_sensitive {
			Cow::Owned(token.to_lowercase())
		} else {
			Cow::Borrowed(token)
		};
		Some(token)
	}
}

/// Lowercase `text` unless `case_sensitive` is set.
pub fn fold_case(text: &str, case_sensitive: bool) -> Cow<'_, str> {
	if case_sensitive || !text.chars().any(char::is_uppercase) {
		Cow::Borrowed(text)
	} else {
		Cow::Owned(text.to_lowercase())
	}
}

#[test]
fn test_tokenizer() {
	fn test(text: &str, case_sensitive: bool, tokens: &[&str]) {
		assert!(Tokenizer::new(text, case_sensitive).eq(tokens.iter().cloned()));
	}
	test("Don't", false, &["don", "t"]);
	test("CEO/Co-founder", false, &["ceo", "co", "founder"]);
	test("CEO(Co-founder)", true, &["CEO", "Co", "founder"]);
	test("$50", false, &["50"]);
	test("50_hello", false, &["50", "hello"]);
	test("C.E.O", false, &["c", "e", "o"]);
	test("  ", false, &[]);
}
