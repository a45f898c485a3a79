use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, parse_quote, spanned::Spanned, Ident, ItemFn, LitStr, Stmt};

/// Marks a test of the `rxrt` crate.
///
/// Sync functions become `#[test]`, async functions become `#[tokio::test]`.
/// `#[rxrt_macro::test(shared)]` runs an async test on the multi-thread
/// runtime. Every expanded test installs a `tracing` subscriber that writes
/// through the test harness and honours `RUST_LOG`.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let mut input = parse_macro_input!(item as ItemFn);

  let is_async = input.sig.asyncness.is_some();

  let raw_args = proc_macro2::TokenStream::from(attr);
  let tokio_args = if raw_args.is_empty() {
    proc_macro2::TokenStream::new()
  } else {
    if !is_async {
      return TokenStream::from(
        syn::Error::new(
          raw_args.span(),
          "rxrt_macro::test flavor args are only supported for async tests. Use \
           #[rxrt_macro::test] for sync tests, or make the function async.",
        )
        .to_compile_error(),
      );
    }

    let flavor = if let Ok(ident) = syn::parse2::<Ident>(raw_args.clone()) {
      (ident.to_string(), ident.span())
    } else if let Ok(lit) = syn::parse2::<LitStr>(raw_args.clone()) {
      (lit.value(), lit.span())
    } else {
      return TokenStream::from(
        syn::Error::new(raw_args.span(), "rxrt_macro::test only accepts `current` or `shared`")
          .to_compile_error(),
      );
    };

    match flavor.0.as_str() {
      "current" => quote!(flavor = "current_thread"),
      "shared" => quote!(flavor = "multi_thread", worker_threads = 2),
      _ => {
        return TokenStream::from(
          syn::Error::new(flavor.1, "rxrt_macro::test only accepts `current` or `shared`")
            .to_compile_error(),
        );
      }
    }
  };

  let init_tracing: Stmt = parse_quote! {
    let _ = ::tracing_subscriber::fmt()
      .with_env_filter(::tracing_subscriber::EnvFilter::from_default_env())
      .with_test_writer()
      .try_init();
  };
  input.block.stmts.insert(0, init_tracing);

  let harness_attr = if is_async { quote!(#[tokio::test(#tokio_args)]) } else { quote!(#[test]) };

  let expanded = quote! {
      #harness_attr
      #input
  };

  TokenStream::from(expanded)
}
