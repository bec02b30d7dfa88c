use crate::common::{create_cpu_client, random_spd_int};
use crate::helpers::{assert_parity_f64, with_cuda_backend};
use densolve::algorithm::linalg::DecompositionAlgorithms;
use densolve::dtype::DType;
use densolve::error::Error;
use densolve::runtime::cpu::CpuRuntime;
use densolve::runtime::cuda::CudaRuntime;
use densolve::runtime::{Allocator, RuntimeClient};
use densolve::tensor::Tensor;

#[test]
fn test_cholesky_parity() {
    let (cpu_client, _) = create_cpu_client();
    let n = 6;
    let data: Vec<f64> = random_spd_int(n, 41).iter().map(|&x| x as f64).collect();
    let ints: Vec<i32> = random_spd_int(n, 41).iter().map(|&x| x as i32).collect();

    let cpu_a = Tensor::<CpuRuntime>::from_slice(&data, &[n, n], &cpu_client);
    let cpu_l: Vec<f64> = cpu_client.cholesky(&cpu_a, None).unwrap().to_vec();

    with_cuda_backend(|cuda_client, _| {
        let cuda_a = Tensor::<CudaRuntime>::from_slice(&data, &[n, n], &cuda_client);
        let cuda_l: Vec<f64> = cuda_client.cholesky(&cuda_a, None).unwrap().to_vec();
        assert_parity_f64(&cpu_l, &cuda_l, 1e-10, 1e-10, "cholesky_f64");

        let cuda_ints = Tensor::<CudaRuntime>::from_slice(&ints, &[n, n], &cuda_client);
        let from_ints = cuda_client.cholesky(&cuda_ints, None).unwrap();
        assert_eq!(from_ints.dtype(), DType::F64);
        assert_parity_f64(&cpu_l, &from_ints.to_vec::<f64>(), 1e-10, 1e-10, "cholesky_i32");

        let as_f32 = cuda_client.cholesky(&cuda_a, Some(DType::F32)).unwrap();
        assert_eq!(as_f32.dtype(), DType::F32);
        assert_parity_f64(&cpu_l, &as_f32.to_f64_vec().unwrap(), 1e-4, 1e-3, "cholesky_f32");
    });
}

#[test]
fn test_cholesky_failure_parity() {
    let (cpu_client, _) = create_cpu_client();
    let data = [1.0f64, 2.0, 2.0, 1.0];
    let cpu_a = Tensor::<CpuRuntime>::from_slice(&data, &[2, 2], &cpu_client);
    let cpu_status = match cpu_client.cholesky(&cpu_a, None) {
        Err(Error::SingularOrIllConditioned { status, .. }) => status,
        other => panic!("expected SingularOrIllConditioned, got {other:?}"),
    };

    with_cuda_backend(|cuda_client, _| {
        let cuda_a = Tensor::<CudaRuntime>::from_slice(&data, &[2, 2], &cuda_client);
        let live = cuda_client.allocator().live_allocations();
        match cuda_client.cholesky(&cuda_a, None) {
            Err(Error::SingularOrIllConditioned { status, .. }) => assert_eq!(status, cpu_status),
            other => panic!("expected SingularOrIllConditioned, got {other:?}"),
        }
        assert_eq!(cuda_client.allocator().live_allocations(), live);
    });
}

#[test]
fn test_forked_stream_shares_accounting() {
    let (cpu_client, _) = create_cpu_client();
    let n = 5;
    let data: Vec<f64> = random_spd_int(n, 43).iter().map(|&x| x as f64).collect();
    let cpu_a = Tensor::<CpuRuntime>::from_slice(&data, &[n, n], &cpu_client);
    let cpu_l: Vec<f64> = cpu_client.cholesky(&cpu_a, None).unwrap().to_vec();

    with_cuda_backend(|cuda_client, _| {
        let forked = cuda_client.fork_stream().unwrap();
        let cuda_a = Tensor::<CudaRuntime>::from_slice(&data, &[n, n], &cuda_client);
        let live = cuda_client.allocator().live_allocations();

        let l = forked.cholesky(&cuda_a, None).unwrap();
        assert_eq!(cuda_client.allocator().live_allocations(), live + 1);
        assert_parity_f64(&cpu_l, &l.to_vec::<f64>(), 1e-10, 1e-10, "cholesky_forked");
        drop(l);
        assert_eq!(forked.allocator().live_allocations(), live);
    });
}
