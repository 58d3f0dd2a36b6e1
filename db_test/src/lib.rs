use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, ItemFn, Pat, Signature, Type};

/// Environment variable naming the MongoDB deployment the tests run against.
const DB_URI_VAR: &str = "SMARTVOTE_TEST_DB_URI";

/// Run an asynchronous test against a real MongoDB deployment.
///
/// Provides a `crate::store::Store` backed by a `MongoStore` on a fresh
/// database, and optionally the [`mongodb::Database`] itself. The database is
/// dropped WHETHER OR NOT the test passes, and a panic is rethrown afterwards.
///
/// The deployment must be a replica set, since the store uses transactions.
/// Its URI is read from `SMARTVOTE_TEST_DB_URI`, defaulting to a local
/// single-node replica set. These tests are ignored by default; run them with
/// `cargo test -- --ignored`.
#[proc_macro_attribute]
pub fn db_test(_: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => return err.into_compile_error().into(),
    };

    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_test", name);
    item_fn.sig.ident = new_name.clone();
    let ignore_reason = format!("needs a MongoDB replica set at ${DB_URI_VAR}");

    quote! {
        #[test]
        #[ignore = #ignore_reason]
        fn #name() {
            #item_fn

            log4rs_test_utils::test_logging::init_logging_once_for(
                ["smartvote_backend"],
                None,
                None,
            );

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("db-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            let uri = std::env::var(#DB_URI_VAR)
                .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string());
            #[allow(unused_variables)]
            let (store, db) = runtime.block_on(async {
                let client = mongodb::Client::with_uri_str(&uri).await.unwrap();
                let db = client.database(&format!("test{}", rand::random::<u32>()));
                let store = crate::store::MongoStore::new(client, &db).await.unwrap();
                (crate::store::Store::new(store), db)
            });

            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                runtime.block_on(#new_name(#(#test_args),*))
            }));

            runtime.block_on(db.drop(None)).unwrap();

            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

/// Ensure the test is async, and map each parameter onto a provided value.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_store = false;
    let mut has_db = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(_) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    // Valid as the last path segment for any type is itself
                    let type_ident = &type_path.path.segments.last().unwrap().ident;
                    if type_ident == "Store" && !has_store {
                        has_store = true;
                        args.push(quote! { store.clone() });
                        continue;
                    } else if type_ident == "Database" && !has_db {
                        has_db = true;
                        args.push(quote! { db.clone() });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected at most one each of `store_ident: Store` and `db_ident: Database`",
        ));
    }

    Ok(args)
}
