#[cfg(test)]
mod resolver_tests {
    use treelox as lox;

    use lox::error::{Diagnostic, Severity};
    use lox::interpreter::Interpreter;
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::Scanner;
    use lox::token::Token;

    /// Scan, parse, and resolve a program; return every finding.
    fn resolve_source(source: &str) -> Vec<Diagnostic> {
        let tokens: Vec<Token> = Scanner::new(source.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .expect("test source must lex");

        let statements = Parser::new(&tokens)
            .parse()
            .expect("test source must parse");

        let mut interpreter = Interpreter::new();
        Resolver::new(&mut interpreter).resolve(&statements)
    }

    fn errors(diagnostics: &[Diagnostic]) -> Vec<&Diagnostic> {
        diagnostics.iter().filter(|d| d.is_error()).collect()
    }

    fn warnings(diagnostics: &[Diagnostic]) -> Vec<&Diagnostic> {
        diagnostics.iter().filter(|d| !d.is_error()).collect()
    }

    #[test]
    fn test_duplicate_declaration_in_same_scope() {
        let diagnostics = resolve_source("{ var a = 1; var a = 2; }");
        let errors = errors(&diagnostics);

        assert_eq!(errors.len(), 1);
        assert!(errors[0]
            .message
            .contains("Already a variable with this name in this scope."));
    }

    #[test]
    fn test_shadowing_in_nested_scope_is_legal() {
        let diagnostics = resolve_source("{ var a = 1; { var a = 2; print a; } print a; }");

        assert!(errors(&diagnostics).is_empty());
    }

    #[test]
    fn test_top_level_redeclaration_is_legal() {
        let diagnostics = resolve_source("var a = 1; var a = 2; print a;");

        assert!(errors(&diagnostics).is_empty());
    }

    #[test]
    fn test_self_referential_initializer() {
        let diagnostics = resolve_source("var x; { var x = x; }");
        let errors = errors(&diagnostics);

        assert_eq!(errors.len(), 1);
        assert!(errors[0]
            .message
            .contains("Can't read local variable in its own initializer."));
    }

    #[test]
    fn test_return_outside_function() {
        let diagnostics = resolve_source("return 1;");

        assert!(errors(&diagnostics)
            .iter()
            .any(|d| d.message.contains("Can't return from top-level code.")));
    }

    #[test]
    fn test_return_value_from_initializer() {
        let diagnostics = resolve_source("class C { init() { return 1; } }");

        assert!(errors(&diagnostics)
            .iter()
            .any(|d| d.message.contains("Can't return a value from an initializer.")));
    }

    #[test]
    fn test_bare_return_from_initializer_is_legal() {
        let diagnostics = resolve_source("class C { init() { return; } }");

        assert!(errors(&diagnostics).is_empty());
    }

    #[test]
    fn test_this_outside_class() {
        let diagnostics = resolve_source("print this;");

        assert!(errors(&diagnostics)
            .iter()
            .any(|d| d.message.contains("Can't use 'this' outside of a class.")));
    }

    #[test]
    fn test_super_outside_class() {
        let diagnostics = resolve_source("fun f() { super.m(); }");

        assert!(errors(&diagnostics)
            .iter()
            .any(|d| d.message.contains("Can't use 'super' outside of a class.")));
    }

    #[test]
    fn test_super_without_superclass() {
        let diagnostics = resolve_source("class C { m() { super.m(); } }");

        assert!(errors(&diagnostics)
            .iter()
            .any(|d| d
                .message
                .contains("Can't use 'super' in a class with no superclass.")));
    }

    #[test]
    fn test_class_inheriting_from_itself() {
        let diagnostics = resolve_source("class C < C {}");

        assert!(errors(&diagnostics)
            .iter()
            .any(|d| d.message.contains("A class can't inherit from itself.")));
    }

    #[test]
    fn test_break_outside_loop() {
        let diagnostics = resolve_source("break;");

        assert!(errors(&diagnostics)
            .iter()
            .any(|d| d.message.contains("Can't use 'break' outside of a loop.")));
    }

    #[test]
    fn test_break_inside_loop_is_legal() {
        let diagnostics = resolve_source("while (true) break;");

        assert!(errors(&diagnostics).is_empty());
    }

    #[test]
    fn test_break_in_function_does_not_see_outer_loop() {
        let diagnostics = resolve_source("while (true) { fun f() { break; } f(); }");

        assert!(errors(&diagnostics)
            .iter()
            .any(|d| d.message.contains("Can't use 'break' outside of a loop.")));
    }

    #[test]
    fn test_unused_local_warns_once() {
        let diagnostics = resolve_source("{ var lonely = 1; }");
        let warnings = warnings(&diagnostics);

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Warning);
        assert!(warnings[0].message.contains("Variable is never used."));
        assert!(warnings[0].location.contains("lonely"));
    }

    #[test]
    fn test_referenced_local_does_not_warn() {
        let diagnostics = resolve_source("{ var used = 1; print used; }");

        assert!(warnings(&diagnostics).is_empty());
    }

    #[test]
    fn test_unused_top_level_variable_warns() {
        let diagnostics = resolve_source("var lonely = 1;");

        assert_eq!(warnings(&diagnostics).len(), 1);
    }

    #[test]
    fn test_referenced_top_level_variable_does_not_warn() {
        let diagnostics = resolve_source("var used = 1; print used;");

        assert!(warnings(&diagnostics).is_empty());
    }

    #[test]
    fn test_warnings_do_not_block_on_their_own() {
        // An unused variable is a warning, never an error.
        let diagnostics = resolve_source("{ var lonely = 1; }");

        assert!(errors(&diagnostics).is_empty());
        assert!(!warnings(&diagnostics).is_empty());
    }

    #[test]
    fn test_multiple_errors_accumulate() {
        let diagnostics = resolve_source("return 1; break; print this;");

        assert_eq!(errors(&diagnostics).len(), 3);
    }

    #[test]
    fn test_undeclared_global_reference_is_not_a_static_error() {
        // Forward references to globals resolve at runtime.
        let diagnostics = resolve_source("fun f() { return later(); } fun later() { return 1; }");

        assert!(errors(&diagnostics).is_empty());
    }

    #[test]
    fn test_resolving_twice_yields_identical_diagnostics() {
        let source = "{ var a = 1; var a = 2; }";

        let first: Vec<String> = resolve_source(source)
            .iter()
            .map(|d| d.to_string())
            .collect();
        let second: Vec<String> = resolve_source(source)
            .iter()
            .map(|d| d.to_string())
            .collect();

        assert_eq!(first, second);
    }
}
