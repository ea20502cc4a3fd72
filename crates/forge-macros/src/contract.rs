//! Implementation of the `contract!` function-like macro: ergonomic
//! construction of a [`forge_core::Contract`] table for plugin authors.
//!
//! Parses a punctuated list of procedure declarations and expands each into
//! a chained `with_procedure(...)` call against `Contract::new()`, compiling
//! each schema expression inline so a malformed schema panics at
//! construction time.

use proc_macro2::TokenStream;
use quote::quote;
use syn::braced;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Expr, Ident, LitStr, Token};

struct ContractSpec {
    procedures: Punctuated<ProcedureSpec, Token![,]>,
}

impl Parse for ContractSpec {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        Ok(Self {
            procedures: Punctuated::parse_terminated(input)?,
        })
    }
}

struct ProcedureSpec {
    name: Ident,
    input: Expr,
    output: Expr,
    streamable: bool,
    errors: Vec<(LitStr, Expr)>,
}

impl Parse for ProcedureSpec {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let name: Ident = input.parse()?;
        let body;
        braced!(body in input);
        let fields: Punctuated<ProcedureField, Token![,]> = Punctuated::parse_terminated(&body)?;

        let mut input_schema = None;
        let mut output_schema = None;
        let mut streamable = false;
        let mut errors = Vec::new();

        for field in fields {
            match field {
                ProcedureField::Input(expr) => input_schema = Some(expr),
                ProcedureField::Output(expr) => output_schema = Some(expr),
                ProcedureField::Streamable => streamable = true,
                ProcedureField::Errors(map) => errors = map,
            }
        }

        let input_schema = input_schema
            .ok_or_else(|| syn::Error::new(name.span(), "procedure is missing an `input:` schema"))?;
        let output_schema = output_schema
            .ok_or_else(|| syn::Error::new(name.span(), "procedure is missing an `output:` schema"))?;

        Ok(Self {
            name,
            input: input_schema,
            output: output_schema,
            streamable,
            errors,
        })
    }
}

enum ProcedureField {
    Input(Expr),
    Output(Expr),
    Streamable,
    Errors(Vec<(LitStr, Expr)>),
}

impl Parse for ProcedureField {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let key: Ident = input.parse()?;
        match key.to_string().as_str() {
            "input" => {
                input.parse::<Token![:]>()?;
                Ok(Self::Input(input.parse()?))
            }
            "output" => {
                input.parse::<Token![:]>()?;
                Ok(Self::Output(input.parse()?))
            }
            "streamable" => Ok(Self::Streamable),
            "errors" => {
                input.parse::<Token![:]>()?;
                let body;
                braced!(body in input);
                let entries: Punctuated<ErrorEntry, Token![,]> = Punctuated::parse_terminated(&body)?;
                Ok(Self::Errors(entries.into_iter().map(|e| (e.tag, e.schema)).collect()))
            }
            other => Err(syn::Error::new(
                key.span(),
                format!("unknown procedure field `{other}`, expected one of: input, output, streamable, errors"),
            )),
        }
    }
}

struct ErrorEntry {
    tag: LitStr,
    schema: Expr,
}

impl Parse for ErrorEntry {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let tag: LitStr = input.parse()?;
        input.parse::<Token![=>]>()?;
        let schema: Expr = input.parse()?;
        Ok(Self { tag, schema })
    }
}

pub fn expand(input: TokenStream) -> TokenStream {
    let spec = match syn::parse2::<ContractSpec>(input) {
        Ok(spec) => spec,
        Err(err) => return err.to_compile_error(),
    };

    let mut chain = quote! { ::forge_core::Contract::new() };

    for procedure in spec.procedures {
        let name_lit = procedure.name.to_string();
        let input_expr = procedure.input;
        let output_expr = procedure.output;

        let mut descriptor = quote! {
            ::forge_core::ProcedureDescriptor::new(
                ::forge_core::Schema::compile(#input_expr)
                    .expect(concat!("invalid input schema for procedure `", #name_lit, "`")),
                ::forge_core::Schema::compile(#output_expr)
                    .expect(concat!("invalid output schema for procedure `", #name_lit, "`")),
            )
        };

        if procedure.streamable {
            descriptor = quote! { #descriptor.streamable() };
        }

        for (tag, schema_expr) in procedure.errors {
            descriptor = quote! {
                #descriptor.with_error(
                    #tag,
                    ::forge_core::Schema::compile(#schema_expr)
                        .expect(concat!("invalid error schema for procedure `", #name_lit, "`")),
                )
            };
        }

        chain = quote! { #chain.with_procedure(#name_lit, #descriptor) };
    }

    quote! { #chain }
}
