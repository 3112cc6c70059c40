//! The typed intermediate representation lowering produces and the
//! emitter prints (spec §3 "Data model").

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
	Null,
	Bool(bool),
	Number(f64),
	String(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Ir {
	// Atoms
	Lit(Literal),
	Ident { name: String, is_js: bool },

	// Aggregates
	ArrayExpr(Vec<Ir>),
	ObjectExpr(Vec<(String, Ir)>),
	NewExpr { callee: Box<Ir>, args: Vec<Ir> },

	// Access / call
	MemberExpr { object: Box<Ir>, property: String, computed: bool },
	CallExpr { callee: Box<Ir>, args: Vec<Ir> },
	CallMemberExpr { object: Box<Ir>, property: String, args: Vec<Ir> },
	/// `obj.member` read with no call: extracts the member and, if it is a
	/// function, pre-binds it to `obj` so identity/`this` survive being
	/// passed around (spec §3).
	InteropIIFE { object: Box<Ir>, property: String },

	// Operators
	UnaryExpr { op: String, arg: Box<Ir> },
	BinaryExpr { op: String, left: Box<Ir>, right: Box<Ir> },
	ConditionalExpr { test: Box<Ir>, consequent: Box<Ir>, alternate: Box<Ir> },

	/// Reassignment of an already-bound name or member path (`target =
	/// value`). Not part of the surface language; produced by the `fx`
	/// default-value prologue's internal `js-assign` kernel form (spec
	/// §4.2/§4.6), and by the bundler when wiring a module's `exports.x =
	/// x;` assignments (spec §4.8).
	AssignmentExpr { name: String, value: Box<Ir> },

	// Declarations / statements
	VariableDeclaration { kind: VarKind, name: String, init: Box<Ir> },
	ExportVariableDeclaration { declaration: Box<Ir>, export_name: String },
	FunctionExpression { params: Vec<String>, body: Vec<Ir> },
	ReturnStatement(Box<Ir>),
	ExpressionStatement(Box<Ir>),

	// Modules
	JsImportReference { name: String, source: String },
	ExportNamedDeclaration { specifiers: Vec<ExportSpecifier> },

	Program(Vec<Ir>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VarKind {
	Const,
	Let,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportSpecifier {
	pub local: String,
	pub exported: String,
}
