use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields, Lit, Meta};

/// Derive macro that generates a columnar `*Series` companion for a struct of
/// per-day outputs. All fields in the source struct must be `f64`.
///
/// The generated series struct stores every field as a `Vec<f64>` column and
/// provides `with_capacity`, `push`, `len`, `is_empty`, `column` and
/// `columns`. The source struct gains a `field_names()` associated function.
///
/// `#[outputs(series_name = "CustomName")]` overrides the default name
/// (`{StructName}Series`).
#[proc_macro_derive(DailyOutputs, attributes(outputs))]
pub fn derive_daily_outputs(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;

    let series_name = match extract_series_name(&input) {
        Ok(Some(ident)) => ident,
        Ok(None) => format_ident!("{}Series", name),
        Err(err) => return err.to_compile_error().into(),
    };

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return syn::Error::new_spanned(
                    name,
                    "DailyOutputs can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "DailyOutputs can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    if fields.is_empty() {
        return syn::Error::new_spanned(name, "DailyOutputs struct must have at least one field")
            .to_compile_error()
            .into();
    }

    let mut idents = Vec::with_capacity(fields.len());
    for field in fields {
        if !is_f64_type(&field.ty) {
            return syn::Error::new_spanned(&field.ty, "DailyOutputs derive: all fields must be f64")
                .to_compile_error()
                .into();
        }
        if let Some(ident) = field.ident.as_ref() {
            idents.push(ident);
        }
    }

    let first = idents[0];
    let names: Vec<String> = idents.iter().map(|i| i.to_string()).collect();
    let n_columns = idents.len();

    let expanded = quote! {
        /// Columnar store of daily outputs, one `Vec<f64>` per output.
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct #series_name {
            #(pub #idents: Vec<f64>,)*
        }

        impl #series_name {
            /// Pre-allocate every column for `n` days.
            pub fn with_capacity(n: usize) -> Self {
                Self {
                    #(#idents: Vec::with_capacity(n),)*
                }
            }

            /// Append one day of outputs.
            pub fn push(&mut self, day: &#name) {
                #(self.#idents.push(day.#idents);)*
            }

            /// Number of days stored.
            pub fn len(&self) -> usize {
                self.#first.len()
            }

            /// Returns `true` if no days have been stored.
            pub fn is_empty(&self) -> bool {
                self.#first.is_empty()
            }

            /// Look up a column by output name.
            pub fn column(&self, name: &str) -> Option<&[f64]> {
                match name {
                    #(#names => Some(self.#idents.as_slice()),)*
                    _ => None,
                }
            }

            /// All columns paired with their names, in declaration order.
            pub fn columns(&self) -> [(&'static str, &[f64]); #n_columns] {
                [#((#names, self.#idents.as_slice()),)*]
            }
        }

        impl #name {
            /// Output names in declaration order.
            pub fn field_names() -> &'static [&'static str] {
                &[#(#names),*]
            }
        }
    };

    expanded.into()
}

fn extract_series_name(input: &DeriveInput) -> syn::Result<Option<proc_macro2::Ident>> {
    for attr in &input.attrs {
        if !attr.path().is_ident("outputs") {
            continue;
        }
        let nested = attr.parse_args_with(
            syn::punctuated::Punctuated::<Meta, syn::Token![,]>::parse_terminated,
        )?;
        for meta in nested {
            let nv = match meta {
                Meta::NameValue(nv) => nv,
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "expected `series_name = \"...\"`",
                    ))
                }
            };
            if !nv.path.is_ident("series_name") {
                return Err(syn::Error::new_spanned(&nv.path, "unknown outputs attribute"));
            }
            if let syn::Expr::Lit(expr_lit) = &nv.value {
                if let Lit::Str(lit_str) = &expr_lit.lit {
                    return Ok(Some(format_ident!("{}", lit_str.value())));
                }
            }
            return Err(syn::Error::new_spanned(&nv.value, "series_name must be a string literal"));
        }
    }
    Ok(None)
}

fn is_f64_type(ty: &syn::Type) -> bool {
    match ty {
        syn::Type::Path(type_path) => type_path.qself.is_none() && type_path.path.is_ident("f64"),
        _ => false,
    }
}
