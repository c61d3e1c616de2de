//! Macro engine scenarios: expansion order, stringize, concatenation,
//! recursion suppression, builtin dynamics.

mod common;

use common::{lex_all, lex_texts};
use declmap_lex::TokenKind;

#[test]
fn function_macro_expansion_with_precedence_preserved() {
    let texts = lex_texts("#define M(a,b) a+b\nint y = M(2, 3)*M(4,5);");
    assert_eq!(
        texts,
        ["int", "y", "=", "2", "+", "3", "*", "4", "+", "5", ";"]
    );
}

#[test]
fn stringize_law_single_space_join() {
    // S(α) yields one string literal whose content is the token-joined
    // source of α, single-spaced, no leading/trailing space.
    let (toks, errors) = lex_all("#define S(x) #x\nS(hello world)");
    assert_eq!(errors, 0);
    assert_eq!(toks.len(), 1);
    assert_eq!(toks[0].0, TokenKind::StringLiteral);
    assert_eq!(toks[0].1, "\"hello world\"");
}

#[test]
fn stringize_normalizes_interior_whitespace() {
    let (toks, _) = lex_all("#define S(x) #x\nS(  a   +   b  )");
    assert_eq!(toks[0].1, "\"a + b\"");
}

#[test]
fn concat_builds_single_identifier() {
    let (toks, errors) = lex_all("#define CAT(a,b) a##b\nCAT(foo,bar)");
    assert_eq!(errors, 0);
    assert_eq!(toks.len(), 1);
    assert_eq!(toks[0].0, TokenKind::Identifier);
    assert_eq!(toks[0].1, "foobar");
}

#[test]
fn concat_chain_is_left_associative() {
    let (toks, _) = lex_all("#define CAT3(a,b,c) a##b##c\nCAT3(x,y,z)");
    assert_eq!(toks.len(), 1);
    assert_eq!(toks[0].1, "xyz");
}

#[test]
fn concat_can_build_numbers_and_operators() {
    let (toks, _) = lex_all("#define GLUE(a,b) a##b\nGLUE(12,34) GLUE(<,<)");
    assert_eq!(toks[0].0, TokenKind::DecLiteral);
    assert_eq!(toks[0].1, "1234");
    assert_eq!(toks[1].0, TokenKind::Shl);
}

#[test]
fn expanded_macro_matches_replacement_list() {
    // A define immediately expanded reproduces its replacement tokens.
    let texts = lex_texts("#define BODY a + b * 3\nBODY");
    assert_eq!(texts, ["a", "+", "b", "*", "3"]);
}

#[test]
fn self_reference_is_painted_blue() {
    let texts = lex_texts("#define LOOP LOOP + 1\nLOOP");
    assert_eq!(texts, ["LOOP", "+", "1"]);
}

#[test]
fn arguments_expand_before_substitution() {
    let texts = lex_texts("#define ONE 1\n#define ID(x) x\nint n = ID(ONE);");
    assert_eq!(texts, ["int", "n", "=", "1", ";"]);
}

#[test]
fn nested_invocations_expand_inside_out() {
    let texts = lex_texts("#define ADD(a,b) (a+b)\nint n = ADD(ADD(1,2), 3);");
    assert_eq!(
        texts,
        ["int", "n", "=", "(", "(", "1", "+", "2", ")", "+", "3", ")", ";"]
    );
}

#[test]
fn variadic_macro_swallows_extra_commas() {
    let texts = lex_texts("#define LIST(first, ...) first, __VA_ARGS__\nLIST(1, 2, 3)");
    assert_eq!(texts, ["1", ",", "2", ",", "3"]);
}

#[test]
fn object_macro_with_empty_body_vanishes() {
    let texts = lex_texts("#define NOTHING\nint NOTHING x;");
    assert_eq!(texts, ["int", "x", ";"]);
}

#[test]
fn redefinition_with_new_body_warns() {
    let mut h = common::Harness::new();
    {
        let mut stream = h.stream("redef.cpp", "#define N 1\n#define N 2\nN");
        loop {
            if stream.get_token().kind == TokenKind::EndOfCode {
                break;
            }
        }
    }
    assert_eq!(h.rep.warnings(), 1);
    assert_eq!(h.rep.errors(), 0);
}

#[test]
fn arity_errors_recover() {
    let mut h = common::Harness::new();
    let mut texts = Vec::new();
    {
        let mut stream = h.stream("arity.cpp", "#define PAIR(a,b) a b\nPAIR(1,2,3)");
        loop {
            let tok = stream.get_token();
            if tok.kind == TokenKind::EndOfCode {
                break;
            }
            texts.push(stream.text_of(tok).to_string());
        }
    }
    assert_eq!(texts, ["1", "2"]);
    assert_eq!(h.rep.errors(), 1);
}

#[test]
fn line_builtin_tracks_expansion_site() {
    let texts = lex_texts("int a = __LINE__;\nint b = __LINE__;");
    assert_eq!(texts, ["int", "a", "=", "1", ";", "int", "b", "=", "2", ";"]);
}

#[test]
fn file_builtin_names_current_source() {
    let (toks, _) = lex_all("__FILE__");
    assert_eq!(toks[0].0, TokenKind::StringLiteral);
    assert_eq!(toks[0].1, "\"input.cpp\"");
}
