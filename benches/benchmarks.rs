//! Performance benchmarks for ape.
//!
//! This module contains benchmarks for:
//! - INI parsing and glob-layered resolution
//! - Relative time parsing
//! - Plugin registry discovery and lookup
//! - Building the root operation from a configuration
//!
//! Run with: `cargo bench`

use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ape::config::{parse_ini_str, parse_relative_time, ConfigResolver, ConfigurationMap};
use ape::plugin::{PluginRegistry, ProductContext};
use ape::runner::Operation;

// ============================================================================
// Mock Data Fixtures
// ============================================================================

mod fixtures {
    /// Generate a configuration with `num_sections` plugin sections, all
    /// listed in `[APE]`.
    pub fn generate_config(num_sections: usize) -> String {
        let mut config = String::from("[DEFAULT]\nowner = bench\n\n[APE]\n");
        for i in 0..num_sections {
            config.push_str(&format!("op_{i} = nap_{i}, Dummy\n"));
        }
        for i in 0..num_sections {
            config.push_str(&format!(
                "\n[nap_{i}]\nplugin = Sleep\ntotal = 0 seconds\n# pause {i}\ninterval = 1 min\n"
            ));
        }
        config
    }

    /// Relative times of increasing complexity.
    pub fn relative_times() -> Vec<&'static str> {
        vec![
            "1 second",
            "1 hr 30 min",
            "2 wks 3.5 days 10 minutes 4 s",
            "1 month 2 weeks 3 d 4 h",
        ]
    }
}

// ============================================================================
// Configuration Benchmarks
// ============================================================================

fn bench_ini_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("config/parse");

    for num_sections in [10, 100, 500].iter() {
        let content = fixtures::generate_config(*num_sections);
        group.throughput(Throughput::Bytes(content.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("parse_ini", num_sections),
            &content,
            |b, content| {
                b.iter(|| black_box(parse_ini_str(black_box(content), Path::new("bench.ini"))));
            },
        );
    }

    group.finish();
}

fn bench_glob_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("config/resolve");

    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let primary = temp_dir.path().join("ape.ini");
    std::fs::write(&primary, "[DEFAULT]\nconfig_glob = conf.d/*.ini\n")
        .expect("Failed to write ape.ini");
    std::fs::create_dir_all(temp_dir.path().join("conf.d")).expect("Failed to create conf.d");
    for i in 0..20 {
        std::fs::write(
            temp_dir.path().join(format!("conf.d/part_{i:02}.ini")),
            fixtures::generate_config(5),
        )
        .expect("Failed to write part");
    }

    group.bench_function("resolve_20_files", |b| {
        b.iter(|| black_box(ConfigResolver::new().resolve(black_box(&primary))));
    });

    group.finish();
}

fn bench_relative_time(c: &mut Criterion) {
    let mut group = c.benchmark_group("config/relative_time");

    for source in fixtures::relative_times() {
        group.bench_with_input(BenchmarkId::new("parse", source), source, |b, source| {
            b.iter(|| black_box(parse_relative_time(black_box(source))));
        });
    }

    group.finish();
}

// ============================================================================
// Registry Benchmarks
// ============================================================================

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    group.bench_function("discover", |b| {
        let registry = PluginRegistry::default();
        b.iter(|| black_box(registry.discover()));
    });

    group.bench_function("cached_lookup", |b| {
        let mut registry = PluginRegistry::default();
        b.iter(|| black_box(registry.get_plugin(black_box("sleep"))));
    });

    group.bench_function("lookup_after_refresh", |b| {
        let mut registry = PluginRegistry::default();
        b.iter(|| {
            registry.refresh();
            black_box(registry.get_plugin(black_box("Dummy")))
        });
    });

    group.finish();
}

fn bench_build_root(c: &mut Criterion) {
    let mut group = c.benchmark_group("product");

    for num_sections in [10, 100].iter() {
        let sections = parse_ini_str(&fixtures::generate_config(*num_sections), Path::new("x"))
            .expect("Failed to parse fixture");
        let configuration = ConfigurationMap::from_sections(sections);

        group.throughput(Throughput::Elements(*num_sections as u64 * 2));
        group.bench_with_input(
            BenchmarkId::new("build_ape", num_sections),
            &configuration,
            |b, configuration| {
                let mut registry = PluginRegistry::default();
                b.iter(|| {
                    let mut context = ProductContext::new(configuration, &mut registry);
                    black_box(context.build("Ape", None).map(|operation| operation.name().len()))
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Criterion Groups and Main
// ============================================================================

criterion_group!(config_benches, bench_ini_parsing, bench_glob_resolution, bench_relative_time,);

criterion_group!(registry_benches, bench_registry, bench_build_root,);

criterion_main!(config_benches, registry_benches);
