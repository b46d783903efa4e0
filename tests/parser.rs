#[cfg(test)]
mod parser_tests {
    use treelox as lox;

    use lox::parser::{Expr, LiteralValue, Parser, Stmt};
    use lox::scanner::Scanner;
    use lox::token::Token;

    fn tokens(source: &str) -> Vec<Token<'_>> {
        Scanner::new(source.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .expect("test source must lex")
    }

    #[test]
    fn test_parse_var_declaration() {
        let tokens = tokens("var answer = 42;");
        let statements = Parser::new(&tokens).parse().unwrap();

        assert_eq!(statements.len(), 1);

        let Stmt::Var { name, initializer } = &statements[0] else {
            panic!("expected Var, got {:?}", statements[0]);
        };

        assert_eq!(name.lexeme, "answer");
        assert_eq!(
            initializer,
            &Some(Expr::Literal(LiteralValue::Number(42.0)))
        );
    }

    #[test]
    fn test_parse_comma_is_left_associative() {
        let tokens = tokens("1, 2, 3;");
        let statements = Parser::new(&tokens).parse().unwrap();

        let Stmt::Expression(Expr::Comma { left, right }) = &statements[0] else {
            panic!("expected Comma, got {:?}", statements[0]);
        };

        assert!(matches!(**left, Expr::Comma { .. }));
        assert_eq!(**right, Expr::Literal(LiteralValue::Number(3.0)));
    }

    #[test]
    fn test_parse_ternary_is_right_associative() {
        let tokens = tokens("a ? b : c ? d : e;");
        let statements = Parser::new(&tokens).parse().unwrap();

        let Stmt::Expression(Expr::Ternary { condition, right, .. }) = &statements[0] else {
            panic!("expected Ternary, got {:?}", statements[0]);
        };

        assert!(matches!(**condition, Expr::Variable { .. }));
        assert!(matches!(**right, Expr::Ternary { .. }));
    }

    #[test]
    fn test_parse_call_arguments_are_not_comma_expressions() {
        let tokens = tokens("f(1, 2);");
        let statements = Parser::new(&tokens).parse().unwrap();

        let Stmt::Expression(Expr::Call { arguments, .. }) = &statements[0] else {
            panic!("expected Call, got {:?}", statements[0]);
        };

        assert_eq!(arguments.len(), 2);
    }

    #[test]
    fn test_parse_grouped_comma_is_one_argument() {
        let tokens = tokens("f((1, 2));");
        let statements = Parser::new(&tokens).parse().unwrap();

        let Stmt::Expression(Expr::Call { arguments, .. }) = &statements[0] else {
            panic!("expected Call, got {:?}", statements[0]);
        };

        assert_eq!(arguments.len(), 1);
        assert!(matches!(&arguments[0], Expr::Grouping(inner)
            if matches!(**inner, Expr::Comma { .. })));
    }

    #[test]
    fn test_parse_for_desugars_to_while() {
        let tokens = tokens("for (var i = 0; i < 3; i = i + 1) print i;");
        let statements = Parser::new(&tokens).parse().unwrap();

        // for → Block[ Var, While { body: Block[ Print, Expression(Assign) ] } ]
        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected Block, got {:?}", statements[0]);
        };

        assert_eq!(outer.len(), 2);
        assert!(matches!(outer[0], Stmt::Var { .. }));

        let Stmt::While { body, .. } = &outer[1] else {
            panic!("expected While, got {:?}", outer[1]);
        };

        let Stmt::Block(inner) = &**body else {
            panic!("expected Block body, got {:?}", body);
        };

        assert!(matches!(inner[0], Stmt::Print(_)));
        assert!(matches!(inner[1], Stmt::Expression(Expr::Assign { .. })));
    }

    #[test]
    fn test_parse_for_without_condition_loops_on_true() {
        let tokens = tokens("for (;;) break;");
        let statements = Parser::new(&tokens).parse().unwrap();

        let Stmt::While { condition, body } = &statements[0] else {
            panic!("expected While, got {:?}", statements[0]);
        };

        assert_eq!(*condition, Expr::Literal(LiteralValue::True));
        assert!(matches!(**body, Stmt::Break { .. }));
    }

    #[test]
    fn test_parse_named_function() {
        let tokens = tokens("fun add(a, b) { return a + b; }");
        let statements = Parser::new(&tokens).parse().unwrap();

        let Stmt::Function { name, params, body } = &statements[0] else {
            panic!("expected Function, got {:?}", statements[0]);
        };

        assert_eq!(name.lexeme, "add");
        assert_eq!(params.len(), 2);
        assert!(matches!(body[0], Stmt::Return { .. }));
    }

    #[test]
    fn test_parse_lambda_expression() {
        let tokens = tokens("var id = fun (x) { return x; };");
        let statements = Parser::new(&tokens).parse().unwrap();

        let Stmt::Var { initializer, .. } = &statements[0] else {
            panic!("expected Var, got {:?}", statements[0]);
        };

        assert!(matches!(initializer, Some(Expr::Lambda { .. })));
    }

    #[test]
    fn test_parse_lambda_statement() {
        let tokens = tokens("fun (x) { print x; }");
        let statements = Parser::new(&tokens).parse().unwrap();

        assert!(matches!(statements[0], Stmt::Lambda { .. }));
    }

    #[test]
    fn test_parse_class_with_superclass() {
        let tokens = tokens("class B < A { m() { return 1; } }");
        let statements = Parser::new(&tokens).parse().unwrap();

        let Stmt::Class {
            name,
            superclass,
            methods,
        } = &statements[0]
        else {
            panic!("expected Class, got {:?}", statements[0]);
        };

        assert_eq!(name.lexeme, "B");
        assert!(matches!(superclass, Some(Expr::Variable { name, .. }) if name.lexeme == "A"));
        assert_eq!(methods.len(), 1);
        assert!(matches!(&methods[0], Stmt::Function { name, .. } if name.lexeme == "m"));
    }

    #[test]
    fn test_parse_property_assignment_becomes_set() {
        let tokens = tokens("obj.field = 1;");
        let statements = Parser::new(&tokens).parse().unwrap();

        let Stmt::Expression(Expr::Set { name, .. }) = &statements[0] else {
            panic!("expected Set, got {:?}", statements[0]);
        };

        assert_eq!(name.lexeme, "field");
    }

    #[test]
    fn test_parse_super_access() {
        let tokens = tokens("super.cook");
        let expr = Parser::new(&tokens).parse_expression().unwrap();

        assert!(matches!(expr, Expr::Super { method, .. } if method.lexeme == "cook"));
    }

    #[test]
    fn test_parse_invalid_assignment_target() {
        let tokens = tokens("1 = 2;");
        let result = Parser::new(&tokens).parse();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("Invalid assignment target"));
    }

    #[test]
    fn test_parse_missing_expression() {
        let tokens = tokens("print ;");
        let result = Parser::new(&tokens).parse();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("Expected expression"));
    }

    #[test]
    fn test_resolvable_nodes_have_distinct_ids() {
        let tokens = tokens("a = a + b;");
        let statements = Parser::new(&tokens).parse().unwrap();

        let Stmt::Expression(Expr::Assign { value, id, .. }) = &statements[0] else {
            panic!("expected Assign, got {:?}", statements[0]);
        };

        let Expr::Binary { left, right, .. } = &**value else {
            panic!("expected Binary, got {:?}", value);
        };

        let Expr::Variable { id: left_id, .. } = &**left else {
            panic!();
        };
        let Expr::Variable { id: right_id, .. } = &**right else {
            panic!();
        };

        assert_ne!(left_id, right_id);
        assert_ne!(id, left_id);
        assert_ne!(id, right_id);
    }
}
