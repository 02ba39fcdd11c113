use logos::Logos;

/// Lexical tokens of the usda text format.
///
/// The `#usda 1.0` header line is handled by the parser before lexing, so
/// every other `#` starts a comment.
#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token<'source> {
    #[token("def")]
    Def,
    #[token("over")]
    Over,
    #[token("class")]
    Class,

    #[token("add")]
    Add,
    #[token("append")]
    Append,
    #[token("delete")]
    Delete,
    #[token("prepend")]
    Prepend,
    #[token("reorder")]
    Reorder,

    #[token("references")]
    References,
    #[token("defaultPrim")]
    DefaultPrim,
    #[token("doc")]
    Doc,
    #[token("offset")]
    Offset,
    #[token("scale")]
    Scale,
    #[token("custom")]
    Custom,
    #[token("uniform")]
    Uniform,
    #[token("varying")]
    Varying,
    #[token("rel")]
    Rel,
    #[token("None")]
    None,

    #[token("(", |_| '(')]
    #[token(")", |_| ')')]
    #[token("[", |_| '[')]
    #[token("]", |_| ']')]
    #[token("{", |_| '{')]
    #[token("}", |_| '}')]
    #[token("=", |_| '=')]
    #[token(",", |_| ',')]
    #[token(";", |_| ';')]
    #[token(":", |_| ':')]
    #[token(".", |_| '.')]
    Punctuation(char),

    /// Identifiers, optionally namespaced (`xformOp:translate`) or array typed (`double[]`).
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*(:[A-Za-z_][A-Za-z0-9_]*)*(\[\])?")]
    Identifier(&'source str),

    #[regex(r"[-+]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][-+]?[0-9]+)?")]
    #[regex(r"[-+]?(inf|nan)")]
    Number(&'source str),

    /// String contents without the surrounding quotes; escapes are kept verbatim.
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| trim_quotes(lex.slice(), 1))]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| trim_quotes(lex.slice(), 1))]
    #[regex(r#""""([^"]|"[^"]|""[^"])*""""#, |lex| trim_quotes(lex.slice(), 3))]
    String(&'source str),

    #[regex(r"@[^@\n]*@", |lex| trim_quotes(lex.slice(), 1))]
    AssetRef(&'source str),

    #[regex(r"<[^<>\n]*>", |lex| trim_quotes(lex.slice(), 1))]
    PathRef(&'source str),
}

fn trim_quotes(slice: &str, n: usize) -> &str {
    &slice[n..slice.len() - n]
}

impl<'source> Token<'source> {
    pub fn try_as_identifier(self) -> Option<&'source str> {
        match self {
            Token::Identifier(s) => Some(s),
            _ => None,
        }
    }

    pub fn try_as_string(self) -> Option<&'source str> {
        match self {
            Token::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn try_as_asset_ref(self) -> Option<&'source str> {
        match self {
            Token::AssetRef(s) => Some(s),
            _ => None,
        }
    }

    pub fn try_as_path_ref(self) -> Option<&'source str> {
        match self {
            Token::PathRef(s) => Some(s),
            _ => None,
        }
    }

    /// Source spelling of keyword tokens, so they can double as names.
    pub fn keyword_lexeme(&self) -> Option<&'static str> {
        let lexeme = match self {
            Token::Def => "def",
            Token::Over => "over",
            Token::Class => "class",
            Token::Add => "add",
            Token::Append => "append",
            Token::Delete => "delete",
            Token::Prepend => "prepend",
            Token::Reorder => "reorder",
            Token::References => "references",
            Token::DefaultPrim => "defaultPrim",
            Token::Doc => "doc",
            Token::Offset => "offset",
            Token::Scale => "scale",
            Token::Custom => "custom",
            Token::Uniform => "uniform",
            Token::Varying => "varying",
            Token::Rel => "rel",
            Token::None => "None",
            _ => return None,
        };
        Some(lexeme)
    }
}

/// Resolve backslash escapes in a string token.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token<'_>> {
        Token::lexer(src).map(|t| t.expect("lex error")).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            lex("def Xform \"World\" define"),
            vec![Token::Def, Token::Identifier("Xform"), Token::String("World"), Token::Identifier("define")]
        );
        assert_eq!(
            lex("double[] xformOp:translate"),
            vec![Token::Identifier("double[]"), Token::Identifier("xformOp:translate")]
        );
    }

    #[test]
    fn references_syntax() {
        assert_eq!(
            lex("prepend references = [@./a.usda@</trg> (offset = 1.5; scale = 2)]"),
            vec![
                Token::Prepend,
                Token::References,
                Token::Punctuation('='),
                Token::Punctuation('['),
                Token::AssetRef("./a.usda"),
                Token::PathRef("/trg"),
                Token::Punctuation('('),
                Token::Offset,
                Token::Punctuation('='),
                Token::Number("1.5"),
                Token::Punctuation(';'),
                Token::Scale,
                Token::Punctuation('='),
                Token::Number("2"),
                Token::Punctuation(')'),
                Token::Punctuation(']'),
            ]
        );
    }

    #[test]
    fn numbers_strings_comments() {
        assert_eq!(
            lex("-1.5e3 .5 inf # trailing comment\n'single' \"\"\"triple \"q\" \"\"\""),
            vec![
                Token::Number("-1.5e3"),
                Token::Number(".5"),
                Token::Number("inf"),
                Token::String("single"),
                Token::String("triple \"q\" "),
            ]
        );
    }

    #[test]
    fn time_sample_suffix() {
        assert_eq!(
            lex("anim.timeSamples = { 0: 1, }"),
            vec![
                Token::Identifier("anim"),
                Token::Punctuation('.'),
                Token::Identifier("timeSamples"),
                Token::Punctuation('='),
                Token::Punctuation('{'),
                Token::Number("0"),
                Token::Punctuation(':'),
                Token::Number("1"),
                Token::Punctuation(','),
                Token::Punctuation('}'),
            ]
        );
    }

    #[test]
    fn unescape_sequences() {
        assert_eq!(unescape(r#"a \"b\" \\ \n"#), "a \"b\" \\ \n");
    }
}
