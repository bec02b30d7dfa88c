//! Integration tests for Cholesky decomposition

mod common;

use common::{
    assert_allclose_f64, assert_triangular, create_cpu_client, matmul, random_spd_int, transpose,
};
use densolve::algorithm::linalg::{DecompositionAlgorithms, LinalgConfig, cholesky};
use densolve::dtype::{DType, Element};
use densolve::error::{DecompositionKind, Error};
use densolve::runtime::cpu::{CpuClient, CpuRuntime};
use densolve::runtime::{Allocator, RuntimeClient};
use densolve::tensor::{Layout, MemoryOrder, Storage, Tensor};

/// ‖L·Lᵗ − A‖ within `atol + rtol·max|A|`, `L` lower triangular
fn assert_reconstructs(l: &Tensor<CpuRuntime>, a: &[f64], n: usize, rtol: f64, atol: f64, msg: &str) {
    let l = l.to_f64_vec().unwrap();
    assert_triangular(&l, n, n, false, msg);
    let llt = matmul(&l, &transpose(&l, n, n), n, n, n);
    let scale = a.iter().fold(0.0f64, |acc, x| acc.max(x.abs()));
    assert_allclose_f64(&llt, a, 0.0, atol + rtol * scale, msg);
}

fn check_dtype<T: Element>(client: &CpuClient, data: &[i64], n: usize, expected_out: DType) {
    let converted: Vec<T> = data.iter().map(|&x| T::from_f64(x as f64)).collect();
    let a = Tensor::<CpuRuntime>::from_slice(&converted, &[n, n], client);
    let l = client.cholesky(&a, None).unwrap();
    assert_eq!(l.shape(), &[n, n]);
    assert_eq!(l.dtype(), expected_out, "{:?} input", T::DTYPE);

    let a_f64: Vec<f64> = data.iter().map(|&x| x as f64).collect();
    let rtol = if expected_out == DType::F32 { 1e-5 } else { 1e-12 };
    assert_reconstructs(&l, &a_f64, n, rtol, 1e-3, &format!("cholesky {:?}", T::DTYPE));
}

#[test]
fn test_cholesky_every_supported_dtype() {
    let (client, _) = create_cpu_client();
    let n = 5;
    let data = random_spd_int(n, 7);
    check_dtype::<i32>(&client, &data, n, DType::F64);
    check_dtype::<i64>(&client, &data, n, DType::F64);
    check_dtype::<u32>(&client, &data, n, DType::F64);
    check_dtype::<u64>(&client, &data, n, DType::F64);
    check_dtype::<f32>(&client, &data, n, DType::F32);
    check_dtype::<f64>(&client, &data, n, DType::F64);
}

#[test]
fn test_cholesky_known_factor() {
    let (client, _) = create_cpu_client();
    // [[4, 12, -16], [12, 37, -43], [-16, -43, 98]] = L·Lᵗ, L = [[2, 0, 0], [6, 1, 0], [-8, 5, 3]]
    let a = Tensor::<CpuRuntime>::from_slice(
        &[4.0f64, 12.0, -16.0, 12.0, 37.0, -43.0, -16.0, -43.0, 98.0],
        &[3, 3],
        &client,
    );
    let l: Vec<f64> = cholesky(&client, &a, None).unwrap().to_vec();
    assert_allclose_f64(
        &l,
        &[2.0, 0.0, 0.0, 6.0, 1.0, 0.0, -8.0, 5.0, 3.0],
        1e-12,
        1e-12,
        "known factor",
    );
}

#[test]
fn test_cholesky_reads_only_lower_triangle() {
    let (client, _) = create_cpu_client();
    let a = Tensor::<CpuRuntime>::from_slice(&[1.0f64, 2.0, 1.0, 9.0], &[2, 2], &client);
    let symmetric = Tensor::<CpuRuntime>::from_slice(&[1.0f64, 1.0, 1.0, 9.0], &[2, 2], &client);

    let l: Vec<f64> = client.cholesky(&a, None).unwrap().to_vec();
    let expected: Vec<f64> = client.cholesky(&symmetric, None).unwrap().to_vec();
    assert_eq!(l, expected);
    assert_allclose_f64(&l, &[1.0, 0.0, 1.0, 8.0f64.sqrt()], 1e-12, 1e-12, "[[1,2],[1,9]]");
}

#[test]
fn test_integer_input_matches_f64_input() {
    let (client, _) = create_cpu_client();
    let n = 4;
    let data = random_spd_int(n, 11);
    let ints: Vec<i32> = data.iter().map(|&x| x as i32).collect();
    let floats: Vec<f64> = data.iter().map(|&x| x as f64).collect();

    let from_int: Vec<f64> = client
        .cholesky(&Tensor::<CpuRuntime>::from_slice(&ints, &[n, n], &client), None)
        .unwrap()
        .to_vec();
    let from_f64: Vec<f64> = client
        .cholesky(&Tensor::<CpuRuntime>::from_slice(&floats, &[n, n], &client), None)
        .unwrap()
        .to_vec();
    assert_allclose_f64(&from_int, &from_f64, 1e-12, 1e-12, "int vs f64");
}

#[test]
fn test_requested_dtype_is_honored() {
    let (client, _) = create_cpu_client();
    let a = Tensor::<CpuRuntime>::from_slice(&[4.0f64, 2.0, 2.0, 5.0], &[2, 2], &client);
    let l = client.cholesky(&a, Some(DType::F32)).unwrap();
    assert_eq!(l.dtype(), DType::F32);
    assert_eq!(l.to_vec::<f32>(), [2.0, 0.0, 1.0, 2.0]);

    let ints = Tensor::<CpuRuntime>::from_slice(&[4u64, 2, 2, 5], &[2, 2], &client);
    let l = client.cholesky(&ints, Some(DType::F32)).unwrap();
    assert_eq!(l.dtype(), DType::F32);
}

#[test]
fn test_strided_views_are_staged() {
    let (client, _) = create_cpu_client();
    let n = 4;
    let data: Vec<f64> = random_spd_int(n, 3).iter().map(|&x| x as f64).collect();
    let a = Tensor::<CpuRuntime>::from_slice(&data, &[n, n], &client);
    let expected: Vec<f64> = client.cholesky(&a, None).unwrap().to_vec();

    // Aᵗ = A, but the view is column-major over A's storage
    let at = a.t().unwrap();
    assert!(at.is_col_major());
    let l: Vec<f64> = client.cholesky(&at, None).unwrap().to_vec();
    assert_allclose_f64(&l, &expected, 1e-12, 1e-12, "transposed view");

    let col_major = Tensor::<CpuRuntime>::try_from_slice_ordered(
        &transpose(&data, n, n),
        &[n, n],
        MemoryOrder::ColumnMajor,
        &client,
    )
    .unwrap();
    let l: Vec<f64> = client.cholesky(&col_major, None).unwrap().to_vec();
    assert_allclose_f64(&l, &expected, 1e-12, 1e-12, "column-major input");
}

#[test]
fn test_column_major_output() {
    let client = CpuClient::with_config(LinalgConfig::new().with_output_order(MemoryOrder::ColumnMajor));
    let a = Tensor::<CpuRuntime>::from_slice(&[4.0f64, 2.0, 2.0, 5.0], &[2, 2], &client);
    let l = client.cholesky(&a, None).unwrap();
    assert!(l.is_col_major());
    assert_eq!(l.to_vec::<f64>(), [2.0, 0.0, 1.0, 2.0]);
}

#[test]
fn test_one_by_one() {
    let (client, _) = create_cpu_client();
    let a = Tensor::<CpuRuntime>::from_slice(&[9i32], &[1, 1], &client);
    assert_eq!(client.cholesky(&a, None).unwrap().to_vec::<f64>(), [3.0]);
}

#[test]
fn test_non_square_is_shape_error_without_allocation() {
    let (client, _) = create_cpu_client();
    let a = Tensor::<CpuRuntime>::from_slice(&[1.0f64; 6], &[2, 3], &client);
    let live = client.allocator().live_allocations();

    let err = client.cholesky(&a, None).unwrap_err();
    match &err {
        Error::ShapeError { kind, shape, .. } => {
            assert_eq!(*kind, DecompositionKind::Cholesky);
            assert_eq!(shape, &[2, 3]);
        }
        other => panic!("expected ShapeError, got {other:?}"),
    }
    assert!(err.is_precondition());
    assert_eq!(client.allocator().live_allocations(), live);
}

#[test]
fn test_rank_and_empty_inputs_are_shape_errors() {
    let (client, _) = create_cpu_client();
    let vector = Tensor::<CpuRuntime>::from_slice(&[1.0f64, 2.0], &[2], &client);
    let empty = Tensor::<CpuRuntime>::from_slice::<f64>(&[], &[0, 0], &client);
    let batched = Tensor::<CpuRuntime>::from_slice(&[1.0f64; 8], &[2, 2, 2], &client);
    for input in [&vector, &empty, &batched] {
        assert!(matches!(
            client.cholesky(input, None),
            Err(Error::ShapeError { .. })
        ));
    }
}

#[test]
fn test_unsupported_dtypes() {
    let (client, _) = create_cpu_client();
    let small_ints = Tensor::<CpuRuntime>::from_slice(&[1i16, 0, 0, 1], &[2, 2], &client);
    assert!(matches!(
        client.cholesky(&small_ints, None),
        Err(Error::UnsupportedDType { dtype: DType::I16, .. })
    ));

    let bytes = Tensor::<CpuRuntime>::from_slice(&[1u8, 0, 0, 1], &[2, 2], &client);
    assert!(matches!(
        client.cholesky(&bytes, Some(DType::F64)),
        Err(Error::UnsupportedDType { dtype: DType::U8, .. })
    ));

    let floats = Tensor::<CpuRuntime>::from_slice(&[1.0f64, 0.0, 0.0, 1.0], &[2, 2], &client);
    assert!(matches!(
        client.cholesky(&floats, Some(DType::I32)),
        Err(Error::UnsupportedDType { dtype: DType::I32, .. })
    ));
}

#[test]
fn test_not_positive_definite() {
    let (client, _) = create_cpu_client();
    let live = client.allocator().live_allocations();

    let indefinite = Tensor::<CpuRuntime>::from_slice(&[1.0f64, 2.0, 2.0, 1.0], &[2, 2], &client);
    match client.cholesky(&indefinite, None).unwrap_err() {
        Error::SingularOrIllConditioned { kind, shape, status } => {
            assert_eq!(kind, DecompositionKind::Cholesky);
            assert_eq!(shape, [2, 2]);
            assert_eq!(status, 2);
        }
        other => panic!("expected SingularOrIllConditioned, got {other:?}"),
    }

    let negative = Tensor::<CpuRuntime>::from_slice(&[-1.0f32, 0.0, 0.0, 1.0], &[2, 2], &client);
    assert!(matches!(
        client.cholesky(&negative, None),
        Err(Error::SingularOrIllConditioned { status: 1, .. })
    ));

    // Inputs are still alive; everything the calls allocated is gone
    assert_eq!(client.allocator().live_allocations(), live + 2);
}

#[test]
fn test_input_is_not_mutated() {
    let (client, _) = create_cpu_client();
    let data = [4.0f64, 2.0, 2.0, 5.0];
    let a = Tensor::<CpuRuntime>::from_slice(&data, &[2, 2], &client);
    let first: Vec<f64> = client.cholesky(&a, None).unwrap().to_vec();
    assert_eq!(a.to_vec::<f64>(), data);
    let second: Vec<f64> = client.cholesky(&a, None).unwrap().to_vec();
    assert_eq!(first, second);
    assert!(client.config().raw_outputs_f64());
}

#[test]
fn test_layout_beyond_storage_is_rejected() {
    let (client, _) = create_cpu_client();
    let live = client.allocator().live_allocations();

    for layout in [Layout::contiguous(&[3, 3]), Layout::column_major(&[3, 3])] {
        let storage = Storage::<CpuRuntime>::from_slice(&[4.0f64, 2.0, 2.0, 5.0], &client).unwrap();
        let a = Tensor::from_parts(storage, layout);
        assert!(a.check_storage_bounds().is_err());
        assert!(a.try_to_vec::<f64>().is_err());
        match client.cholesky(&a, None) {
            Err(Error::BackendFailure { kind, shape, .. }) => {
                assert_eq!(kind, DecompositionKind::Cholesky);
                assert_eq!(shape, [3, 3]);
            }
            other => panic!("expected BackendFailure, got {other:?}"),
        }
        drop(a);
        assert_eq!(client.allocator().live_allocations(), live);
    }
}
